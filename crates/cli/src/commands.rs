use anyhow::{Context, Result, bail};
use tracing::info;

use restgate_auth::{TokenConfig, TokenService, explain_authorization};
use restgate_core::{AccessError, ErrorKind, Grant, UserId};
use restgate_infra::{PermissionService, PostgresPermissionStore};

async fn service(database_url: &str) -> Result<PermissionService<PostgresPermissionStore>> {
    let store = PostgresPermissionStore::connect(database_url)
        .await
        .context("connect to grant store")?;
    Ok(PermissionService::new(store))
}

fn token_service() -> Result<TokenService> {
    let config = TokenConfig::from_env().context("load token configuration")?;
    Ok(TokenService::new(&config))
}

pub async fn migrate(database_url: &str) -> Result<()> {
    let store = PostgresPermissionStore::connect(database_url)
        .await
        .context("connect to grant store")?;
    store.apply_schema().await.context("apply schema")?;
    info!("schema applied");
    Ok(())
}

pub async fn issue(user: UserId, database_url: &str) -> Result<()> {
    let tokens = token_service()?;
    let service = service(database_url).await?;

    match service.issue_token(user, &tokens).await {
        Ok(token) => {
            println!("{token}");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::EmptyResult => bail!("user {user} has no REST grants"),
        Err(e) => Err(e).context("issue credential"),
    }
}

pub fn inspect(token: &str, request: Option<(&str, &str)>) -> Result<()> {
    let tokens = token_service()?;
    let permissions = tokens.validate_permissions(token).map_err(|e| {
        let summary = e.public_message();
        anyhow::Error::new(e).context(summary)
    })?;

    match request {
        Some((path, method)) => {
            let explanation = explain_authorization(&permissions, path, method);
            println!("{}", serde_json::to_string_pretty(&explanation)?);
        }
        None => println!("{}", serde_json::to_string_pretty(&permissions)?),
    }
    Ok(())
}

pub async fn grant(grant: Grant, database_url: &str) -> Result<()> {
    let service = service(database_url).await?;
    service.grant(grant).await.map_err(|e| match e {
        AccessError::MissingReference(check) => anyhow::anyhow!("grant rejected: {check}"),
        other => anyhow::Error::new(other).context("record grant"),
    })?;
    info!(
        user = %grant.user_id,
        resource = %grant.resource_id,
        method = %grant.method_id,
        "granted"
    );
    Ok(())
}

pub async fn revoke(grant: Grant, database_url: &str) -> Result<()> {
    let service = service(database_url).await?;
    match service.revoke(grant).await {
        Ok(()) => {
            info!(
                user = %grant.user_id,
                resource = %grant.resource_id,
                method = %grant.method_id,
                "revoked"
            );
            Ok(())
        }
        Err(e) if e.is_empty_result() => bail!("no such grant"),
        Err(e) => Err(e).context("remove grant"),
    }
}

pub async fn list(user: UserId, describe: bool, database_url: &str) -> Result<()> {
    let service = service(database_url).await?;

    let rendered = if describe {
        service
            .permissions_with_descriptions(user)
            .await
            .map(|groups| serde_json::to_string_pretty(&groups))
    } else {
        service
            .permission_ids(user)
            .await
            .map(|groups| serde_json::to_string_pretty(&groups))
    };

    match rendered {
        Ok(json) => {
            println!("{}", json?);
            Ok(())
        }
        Err(e) if e.is_empty_result() => bail!("user {user} has no REST grants"),
        Err(e) => Err(e).context("list grants"),
    }
}
