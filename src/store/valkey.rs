use fred::prelude::*;

/// Connect to Valkey when a URL is configured. Without one, features backed
/// by Valkey (login rate limiting) are disabled.
#[tracing::instrument(skip(url), err)]
pub async fn connect(url: Option<&str>) -> anyhow::Result<Option<fred::clients::Pool>> {
    let Some(url) = url else {
        tracing::info!("no valkey url configured, rate limiting disabled");
        return Ok(None);
    };

    let config = fred::types::config::Config::from_url(url)?;
    let pool = fred::clients::Pool::new(config, None, None, None, 4)?;
    pool.init().await?;

    tracing::info!("connected to valkey");
    Ok(Some(pool))
}
