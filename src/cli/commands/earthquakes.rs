use clap::{Args, Subcommand};
use serde_json::json;

use crate::cli::{utils, Context, ListArgs, ScopeArgs};
use crate::database::models::Earthquake;
use crate::error::ApiError;

#[derive(Subcommand)]
pub enum EarthquakeCommands {
    #[command(about = "List earthquakes matching the given filters")]
    List {
        #[command(flatten)]
        scope: ScopeArgs,

        #[command(flatten)]
        list: ListArgs,
    },

    #[command(about = "Fetch earthquakes by id")]
    Get {
        #[arg(required = true, help = "One or more earthquake ids")]
        ids: Vec<i64>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    #[command(about = "Count earthquakes matching the given filters")]
    Count {
        #[command(flatten)]
        scope: ScopeArgs,

        #[command(flatten)]
        filters: FilterArgs,
    },

    #[command(about = "Delete an earthquake by id")]
    Delete {
        #[arg(help = "Earthquake id")]
        id: i64,

        #[command(flatten)]
        scope: ScopeArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    #[arg(long = "filter", help = "Filter as field:op[:value], repeatable")]
    pub filters: Vec<String>,
}

pub async fn handle(cmd: EarthquakeCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        EarthquakeCommands::List { scope, list } => {
            let query = ctx.list_query::<Earthquake>(&list)?;
            let earthquakes = ctx
                .in_scope(&scope, move |uow| {
                    Box::pin(async move {
                        let mut repo = uow.repository::<Earthquake>()?;
                        Ok::<_, ApiError>(repo.list(&query).await?)
                    })
                })
                .await?;
            utils::output_records(&ctx.output, "earthquakes", &earthquakes, summary_line)
        }
        EarthquakeCommands::Get { ids, scope } => {
            let earthquakes = ctx
                .in_scope(&scope, move |uow| {
                    Box::pin(async move {
                        let mut repo = uow.repository::<Earthquake>()?;
                        match ids.as_slice() {
                            [id] => repo
                                .get_by_id(*id)
                                .await?
                                .map(|earthquake| vec![earthquake])
                                .ok_or_else(|| ApiError::not_found(format!("Earthquake {} not found", id))),
                            _ => Ok(repo.list_by_ids(&ids).await?),
                        }
                    })
                })
                .await?;
            match earthquakes.as_slice() {
                [earthquake] => utils::output_record(&ctx.output, earthquake),
                _ => utils::output_records(&ctx.output, "earthquakes", &earthquakes, summary_line),
            }
        }
        EarthquakeCommands::Count { scope, filters } => {
            let list = ListArgs { filters: filters.filters, ..Default::default() };
            let query = ctx.list_query::<Earthquake>(&list)?;
            let count = ctx
                .in_scope(&scope, move |uow| {
                    Box::pin(async move {
                        let mut repo = uow.repository::<Earthquake>()?;
                        Ok::<_, ApiError>(repo.count(&query.filters).await?)
                    })
                })
                .await?;
            utils::output_success(&ctx.output, &format!("{} earthquakes", count), Some(json!({ "count": count })))
        }
        EarthquakeCommands::Delete { id, scope } => {
            let deleted = ctx
                .in_scope(&scope, move |uow| {
                    Box::pin(async move {
                        let mut repo = uow.repository::<Earthquake>()?;
                        repo.delete(id)
                            .await?
                            .ok_or_else(|| ApiError::not_found(format!("Earthquake {} not found", id)))
                    })
                })
                .await?;
            utils::output_success(
                &ctx.output,
                &format!("Deleted earthquake {}: {}", id, deleted.title),
                Some(json!({ "earthquake": deleted })),
            )
        }
    }
}

fn summary_line(earthquake: &Earthquake) -> String {
    let magnitude = earthquake
        .magnitude
        .map(|m| format!("M{:.1}", m))
        .unwrap_or_else(|| "M?".to_string());
    let occurred_at = earthquake
        .occurred_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%SZ").to_string())
        .unwrap_or_default();
    format!(
        "{:>8}  {:<6} {:<20} {}",
        earthquake.id.map(|id| id.to_string()).unwrap_or_default(),
        magnitude,
        occurred_at,
        earthquake.place.as_deref().unwrap_or(&earthquake.title)
    )
}
