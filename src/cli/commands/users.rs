use clap::Subcommand;

use crate::cli::{utils, Context, ScopeArgs};
use crate::database::models::User;
use crate::error::ApiError;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Look up a user by email address")]
    GetByEmail {
        #[arg(help = "Email address")]
        email: String,

        #[command(flatten)]
        scope: ScopeArgs,
    },
}

pub async fn handle(cmd: UserCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        UserCommands::GetByEmail { email, scope } => {
            let user = ctx
                .in_scope(&scope, move |uow| {
                    Box::pin(async move {
                        let mut repo = uow.repository::<User>()?;
                        repo.get_by_email(&email)
                            .await?
                            .ok_or_else(|| ApiError::not_found(format!("No user with email {}", email)))
                    })
                })
                .await?;
            utils::output_record(&ctx.output, &user)
        }
    }
}
