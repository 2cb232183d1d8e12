use clap::Subcommand;

use crate::cli::{utils, Context, ListArgs, ScopeArgs};
use crate::database::models::Organization;
use crate::error::ApiError;

#[derive(Subcommand)]
pub enum OrganizationCommands {
    #[command(about = "List organizations")]
    List {
        #[command(flatten)]
        scope: ScopeArgs,

        #[command(flatten)]
        list: ListArgs,
    },
}

pub async fn handle(cmd: OrganizationCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        OrganizationCommands::List { scope, list } => {
            let query = ctx.list_query::<Organization>(&list)?;
            let organizations = ctx
                .in_scope(&scope, move |uow| {
                    Box::pin(async move {
                        let mut repo = uow.repository::<Organization>()?;
                        Ok::<_, ApiError>(repo.list(&query).await?)
                    })
                })
                .await?;
            utils::output_records(&ctx.output, "organizations", &organizations, |org| {
                format!("{:>8}  {}", org.id.map(|id| id.to_string()).unwrap_or_default(), org.name)
            })
        }
    }
}
