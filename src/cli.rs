//! Interface de linha de comando do trellis baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (status, checklist,
//! advance, set-field, demo) e flags globais (--user, --data-dir, --verbose).

use clap::{Parser, Subcommand};

/// trellis — motor de fluxo de produção de conteúdo por canais.
#[derive(Debug, Parser)]
#[command(name = "trellis", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Usuário em nome de quem a operação é executada.
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Diretório de dados (sobrepõe `trellis.toml`).
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Mostra os canais, suas colunas e as tarefas ativas.
    Status,

    /// Lista os campos obrigatórios ainda pendentes de uma tarefa.
    Checklist {
        /// Identificador da tarefa.
        task_id: String,
    },

    /// Avança uma tarefa para a próxima coluna (ou a finaliza).
    Advance {
        /// Identificador da tarefa.
        task_id: String,
    },

    /// Atribui um valor a um campo personalizado de uma tarefa.
    SetField {
        /// Identificador da tarefa.
        task_id: String,
        /// Identificador do campo personalizado.
        field_id: String,
        /// Valor bruto, interpretado conforme o tipo declarado do campo.
        value: String,
    },

    /// Executa a demonstração embutida do pipeline de estágios.
    Demo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_advance_subcommand() {
        let cli = Cli::parse_from(["trellis", "advance", "task-123"]);
        match cli.command {
            Command::Advance { task_id } => assert_eq!(task_id, "task-123"),
            _ => panic!("expected Advance command"),
        }
    }

    #[test]
    fn cli_parses_set_field_subcommand() {
        let cli = Cli::parse_from(["trellis", "set-field", "task-1", "field-link", "https://x.com"]);
        match cli.command {
            Command::SetField {
                task_id,
                field_id,
                value,
            } => {
                assert_eq!(task_id, "task-1");
                assert_eq!(field_id, "field-link");
                assert_eq!(value, "https://x.com");
            }
            _ => panic!("expected SetField command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "trellis",
            "--user",
            "user-ana",
            "--data-dir",
            "/tmp/boards",
            "--verbose",
            "status",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.user.as_deref(), Some("user-ana"));
        assert_eq!(cli.data_dir.as_deref(), Some("/tmp/boards"));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
