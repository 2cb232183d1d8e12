pub mod commands;
pub mod utils;

use std::collections::HashMap;

use clap::{Args, Parser, Subcommand};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::database::models::Entity;
use crate::database::{DatabaseManager, ListQuery, TenantScope, UnitOfWork, UnitOfWorkFactory, UowOptions};
use crate::error::ApiError;
use crate::filter::{translate_filters, translate_sorts, FiltersAndSortsParser};

#[derive(Parser)]
#[command(name = "fury")]
#[command(about = "Fury CLI - tenant-scoped access to the Fury data store")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Check database connectivity")]
    Health,

    #[command(about = "Earthquake records")]
    Earthquakes {
        #[command(subcommand)]
        cmd: commands::earthquakes::EarthquakeCommands,
    },

    #[command(about = "Organizations (tenants)")]
    Organizations {
        #[command(subcommand)]
        cmd: commands::organizations::OrganizationCommands,
    },

    #[command(about = "User accounts")]
    Users {
        #[command(subcommand)]
        cmd: commands::users::UserCommands,
    },
}

/// Tenant isolation flags shared by every data command
#[derive(Args, Debug, Clone, Default)]
pub struct ScopeArgs {
    #[arg(long, help = "Organization id to scope the session to")]
    pub tenant: Option<i64>,

    #[arg(long, help = "Use the read-only pool and role")]
    pub read_only: bool,

    #[arg(long, help = "Use the restricted query role")]
    pub query_user: bool,
}

/// Query-string style filtering and paging for list commands
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(long = "filter", help = "Filter as field:op[:value], repeatable")]
    pub filters: Vec<String>,

    #[arg(long = "sort", help = "Sort as field[:asc|desc], repeatable")]
    pub sorts: Vec<String>,

    #[arg(long)]
    pub limit: Option<u64>,

    #[arg(long)]
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Everything a command handler needs
pub struct Context {
    pub config: AppConfig,
    pub manager: DatabaseManager,
    pub factory: UnitOfWorkFactory,
    pub output: OutputFormat,
}

impl Context {
    /// Run `body` in a unit of work, bound to the requested tenant if any
    pub async fn in_scope<T, F>(&self, scope: &ScopeArgs, body: F) -> Result<T, ApiError>
    where
        F: for<'a> FnOnce(&'a mut UnitOfWork) -> BoxFuture<'a, Result<T, ApiError>> + Send + 'static,
        T: Send + 'static,
    {
        let options = UowOptions::default().read_only(scope.read_only).query_user(scope.query_user);
        match scope.tenant {
            Some(tenant_id) => {
                let tenant = TenantScope::new(tenant_id);
                self.factory
                    .with_uow(options, move |uow| Box::pin(async move { uow.with_tenant(tenant, body).await }))
                    .await
            }
            None => self.factory.with_uow(options, body).await,
        }
    }

    /// Parse, validate and type `--filter`/`--sort` arguments for `E`
    pub fn list_query<E: Entity>(&self, args: &ListArgs) -> Result<ListQuery, ApiError> {
        let schema = E::filter_definition();
        let parser = FiltersAndSortsParser::with_separators(
            &schema,
            self.config.filter.fields_separator.as_str(),
            self.config.filter.path_separator.as_str(),
        );
        let (filters, sorts) = parser.parse(&args.filters, &args.sorts)?;
        let identity = HashMap::new();
        let filters = translate_filters(filters, &identity, &schema, None)?;
        let sorts = translate_sorts(sorts, &identity, &schema)?;

        let limit = match (args.limit, self.config.filter.max_limit) {
            (Some(limit), Some(max)) if max >= 0 => Some(limit.min(max as u64)),
            (None, Some(max)) if max >= 0 => Some(max as u64),
            (limit, _) => limit,
        };
        Ok(ListQuery { filters, sorts, limit, offset: args.offset })
    }
}

pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    let output = OutputFormat::from_cli(&cli);
    config.filter.validate()?;
    let manager = DatabaseManager::connect(&config.database).await?;
    let factory = UnitOfWorkFactory::from_manager(&manager, &config)?;
    let ctx = Context { config, manager, factory, output };

    let result = match cli.command {
        Commands::Health => commands::health::handle(&ctx).await,
        Commands::Earthquakes { cmd } => commands::earthquakes::handle(cmd, &ctx).await,
        Commands::Organizations { cmd } => commands::organizations::handle(cmd, &ctx).await,
        Commands::Users { cmd } => commands::users::handle(cmd, &ctx).await,
    };

    ctx.manager.close().await;
    if let Err(e) = &result {
        if let Some(api_error) = e.downcast_ref::<ApiError>() {
            utils::output_error(&ctx.output, api_error)?;
        }
    }
    result
}
