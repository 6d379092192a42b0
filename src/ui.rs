//! Interface de terminal do trellis — saída colorida dos quadros.
//!
//! Usa a crate `console` para estilização com cores. O [`BoardView`]
//! apresenta canais, checklists e resultados de transição no terminal.

use console::Style;

use crate::engine::{AdvanceOutcome, EditOutcome};
use crate::store::EntityStore;
use crate::workflow::{CompletedTask, StageEvent, Task};

/// Apresentação textual do estado dos quadros e das transições.
pub struct BoardView {
    // Estilo verde para sucesso.
    green: Style,
    // Estilo vermelho para rejeições e falhas.
    red: Style,
    // Estilo amarelo para pendências.
    yellow: Style,
    // Estilo ciano para títulos e identificadores.
    cyan: Style,
}

impl Default for BoardView {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardView {
    pub fn new() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            cyan: Style::new().cyan(),
        }
    }

    /// Lista canais, colunas e a contagem de tarefas ativas por coluna.
    pub fn print_status(&self, store: &EntityStore) {
        if store.channels().is_empty() {
            println!("No channels yet.");
            return;
        }
        for channel in store.channels() {
            let marker = if channel.archived { " (archived)" } else { "" };
            println!(
                "{}{marker}  [{}]",
                self.cyan.apply_to(&channel.name),
                channel.id
            );
            let mut columns: Vec<_> = channel.columns.iter().collect();
            columns.sort_by_key(|c| c.order);
            for column in columns {
                let tasks: Vec<&Task> = store
                    .tasks_in_channel(&channel.id)
                    .into_iter()
                    .filter(|t| t.column_id == column.id)
                    .collect();
                println!("  {} · {} task(s)", column.name, tasks.len());
                for task in tasks {
                    println!("      {}  [{}]", task.title, task.id);
                }
            }
        }
    }

    /// Mostra a checklist de campos obrigatórios pendentes de uma tarefa.
    pub fn print_checklist(&self, task: &Task, missing: &[String]) {
        println!("{}  [{}]", self.cyan.apply_to(&task.title), task.id);
        if missing.is_empty() {
            println!(
                "  {} All mandatory fields filled; ready to advance",
                self.green.apply_to("✓")
            );
            return;
        }
        for name in missing {
            println!("  {} {name}", self.yellow.apply_to("•"));
        }
    }

    /// Exibe o resultado de uma chamada de avanço.
    pub fn print_advance_outcome(&self, outcome: &AdvanceOutcome) {
        match outcome {
            AdvanceOutcome::Advanced { to_column_id } => {
                println!(
                    "  {} Task advanced to column {to_column_id}",
                    self.green.apply_to("✓")
                );
            }
            AdvanceOutcome::Finalized { completed_task_id } => {
                println!(
                    "  {} Task finalized; snapshot {completed_task_id} archived",
                    self.green.apply_to("✓")
                );
            }
            AdvanceOutcome::Rejected { missing } => {
                println!(
                    "  {} Cannot advance, missing mandatory fields:",
                    self.red.apply_to("✗")
                );
                for name in missing {
                    println!("      {} {name}", self.yellow.apply_to("•"));
                }
            }
        }
    }

    /// Exibe o resultado de uma edição de campo.
    pub fn print_edit_outcome(&self, outcome: &EditOutcome) {
        match outcome {
            EditOutcome::Updated => {
                println!("  {} Field value stored", self.green.apply_to("✓"));
            }
            EditOutcome::PermissionDenied => {
                println!(
                    "  {} You are not allowed to edit this field",
                    self.red.apply_to("✗")
                );
            }
            EditOutcome::InvalidValue { reason } => {
                println!("  {} Invalid value: {reason}", self.red.apply_to("✗"));
            }
        }
    }

    /// Imprime a trilha de auditoria de uma tarefa.
    pub fn print_audit_trail(&self, events: &[&StageEvent]) {
        if events.is_empty() {
            return;
        }
        println!("{}", self.cyan.apply_to("─── Stage events ───"));
        for event in events {
            println!(
                "  {}  {} → {}  by {}  at {}",
                event.event_type, event.from_column_id, event.to_column_id, event.actor_user_id,
                event.occurred_at.to_rfc3339()
            );
        }
    }

    /// Imprime um snapshot de arquivamento formatado em JSON.
    pub fn print_snapshot(&self, snapshot: &CompletedTask) {
        println!("{}", self.green.apply_to("─── Completed task ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(snapshot).unwrap_or_default()
        );
    }
}
