use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use workflow_admin::config::Config;
use workflow_admin::logging;
use workflow_admin::rest::{self, state::bootstrap_registry, ApiDoc, ApiState};

#[derive(Parser)]
#[command(name = "wfadmin")]
#[command(about = "Administer versioned workflows and workflow templates")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SpecFormat {
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server
    Api {
        /// Port to listen on (default from config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind (default from config)
        #[arg(long)]
        host: Option<String>,
    },

    /// List the step and workflow templates contributed by plugins
    Templates {
        /// Include hidden workflow templates
        #[arg(long)]
        all: bool,
    },

    /// Print the OpenAPI specification
    Openapi {
        #[arg(short, long, value_enum, default_value = "json")]
        format: SpecFormat,
    },

    /// Write the default configuration to .wfadmin/config.toml
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _logging_handle = logging::init_logging(&config, cli.debug)?;

    match cli.command {
        Commands::Api { port, host } => cmd_api(config, host, port).await?,
        Commands::Templates { all } => cmd_templates(&config, all)?,
        Commands::Openapi { format } => cmd_openapi(format)?,
        Commands::InitConfig { force } => cmd_init_config(force)?,
    }

    Ok(())
}

async fn cmd_api(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.api.host = host;
    }
    if let Some(port) = port {
        config.api.port = port;
    }

    let state = ApiState::from_config(&config)?;

    println!("Starting REST API server...");
    println!("  Address:   {}", config.bind_address());
    println!("  Templates: {}", config.templates_path().display());
    println!(
        "  Catalog:   {} step templates, {} workflow templates",
        state.registry.step_templates().count(),
        state.registry.workflow_templates().count()
    );
    println!();

    rest::serve(state, &config.bind_address()).await
}

fn cmd_templates(config: &Config, all: bool) -> Result<()> {
    let registry = bootstrap_registry(config)?;

    println!("Step templates:");
    for st in registry.step_templates() {
        println!("  {:<32} v{:<3} {}", st.id, st.v, st.title);
    }

    println!();
    println!("Workflow templates:");
    for wt in registry.workflow_templates().filter(|wt| all || !wt.hidden) {
        println!(
            "  {:<32} v{:<3} {} ({} steps)",
            wt.id,
            wt.v,
            wt.title,
            wt.selected_steps.len()
        );
    }

    Ok(())
}

fn cmd_openapi(format: SpecFormat) -> Result<()> {
    let spec = match format {
        SpecFormat::Json => ApiDoc::json().context("Failed to render OpenAPI JSON")?,
        SpecFormat::Yaml => ApiDoc::yaml().context("Failed to render OpenAPI YAML")?,
    };
    println!("{}", spec);
    Ok(())
}

fn cmd_init_config(force: bool) -> Result<()> {
    let path = Config::project_config_path();
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Config::default().save()?;
    println!("Wrote {}", path.display());
    Ok(())
}
