//! Application runtime: wires configuration, the API client, the dispatcher
//! and the interaction endpoint together.

use std::future::Future;
use std::io;
use std::sync::Arc;

use hookline_core::Snowflake;
use hookline_framework::{Dispatcher, DispatcherBuilder};
use hookline_transport::{ClientConfig, HttpClient, InteractionServer, Verifier};
use tokio::signal;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use crate::config::{ConfigError, ConfigLoader, HooklineConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// A configured application, ready to serve a [`Dispatcher`].
///
/// # Example
///
/// ```rust,ignore
/// let runtime = HooklineRuntime::builder().profile("production").build()?;
///
/// let dispatcher = runtime
///     .dispatcher()
///     .command(Command::new("ping", "Replies with pong").handler(ping))
///     .build();
///
/// runtime.run(dispatcher).await?;
/// ```
pub struct HooklineRuntime {
    config: HooklineConfig,
    client: HttpClient,
    verifier: Verifier,
}

impl HooklineRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Initializes logging from `config.logging` (unless a subscriber is
    /// already installed) and requires a bot token.
    pub fn from_config(config: HooklineConfig) -> RuntimeResult<Self> {
        logging::init_from_config(&config.logging);

        if config.bot.token.is_empty() {
            return Err(ConfigError::missing_field("bot.token").into());
        }

        let verifier = match &config.bot.public_key {
            Some(key) => Verifier::from_hex(key)?,
            None => {
                warn!("No public key configured, every interaction will be rejected");
                Verifier::disabled()
            }
        };

        let client = HttpClient::new(client_config(&config))?;

        info!(
            api = %client.config().api_url(),
            application_id = ?config.bot.application_id,
            "Hookline runtime created"
        );

        Ok(Self {
            config,
            client,
            verifier,
        })
    }

    pub fn config(&self) -> &HooklineConfig {
        &self.config
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// A dispatcher builder sharing this runtime's client, with the
    /// configured verifier and event settings applied.
    pub fn dispatcher(&self) -> DispatcherBuilder {
        Dispatcher::builder(self.client.clone())
            .verifier(self.verifier.clone())
            .debug_events(self.config.bot.debug_events)
    }

    /// Fetches the bot user, marks `dispatcher` ready and syncs commands if
    /// configured to.
    pub async fn start(&self, dispatcher: &Dispatcher) -> RuntimeResult<()> {
        let me = self.client.me().await?;
        dispatcher.mark_ready(me);

        if self.config.bot.sync_commands {
            let guild_id = self.config.bot.sync_guild.map(Snowflake::from);
            self.client
                .update_commands(&dispatcher.commands_json(), guild_id)
                .await?;
        }

        Ok(())
    }

    /// Serves `dispatcher` until Ctrl+C or SIGTERM.
    pub async fn run(&self, dispatcher: Dispatcher) -> RuntimeResult<()> {
        self.run_until(dispatcher, wait_for_shutdown()).await
    }

    /// Serves `dispatcher` until `shutdown` completes.
    ///
    /// The endpoint is bound before start-up so liveness checks see a 503
    /// until the bot user is known. On the way out, in-flight requests are
    /// finished and background tasks get `server.shutdown_timeout_secs` to
    /// wind down.
    pub async fn run_until<F>(&self, dispatcher: Dispatcher, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let server = InteractionServer::new(Arc::new(dispatcher.clone()))
            .bind_addr(self.config.server.bind_addr())
            .path(self.config.server.path.clone())
            .bind()
            .await?;

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let mut serving = tokio::spawn(server.serve(async move {
            let _ = stop_rx.await;
        }));

        let started = self.start(&dispatcher).await;
        let mut ended_early = None;
        match &started {
            Ok(()) => {
                info!("Hookline is now running");
                ended_early = wait_while_serving(&mut serving, shutdown).await;
            }
            Err(e) => error!(error = %e, "Start-up failed"),
        }

        let _ = stop_tx.send(());
        let served = match ended_early {
            Some(result) => result,
            None => serving.await,
        }
        .map_err(|e| RuntimeError::Task(e.to_string()));
        dispatcher
            .shutdown(self.config.server.shutdown_timeout())
            .await;

        started?;
        served??;
        info!("Hookline stopped");
        Ok(())
    }
}

/// Waits for `shutdown`, unless the endpoint task ends first.
///
/// Returns the task's outcome when the endpoint stopped on its own.
async fn wait_while_serving<F>(
    serving: &mut JoinHandle<io::Result<()>>,
    shutdown: F,
) -> Option<Result<io::Result<()>, JoinError>>
where
    F: Future<Output = ()>,
{
    tokio::select! {
        () = shutdown => None,
        result = serving => {
            match &result {
                Ok(Ok(())) => warn!("Interaction endpoint stopped before shutdown was requested"),
                Ok(Err(e)) => error!(error = %e, "Interaction endpoint failed"),
                Err(e) => error!(error = %e, "Interaction endpoint task aborted"),
            }
            Some(result)
        }
    }
}

fn client_config(config: &HooklineConfig) -> ClientConfig {
    let mut client = ClientConfig::new(config.bot.token.clone())
        .api_version(config.http.api_version)
        .base_url(config.http.base_url.clone())
        .timeout(config.http.timeout())
        .max_attempts(config.http.max_attempts);
    if let Some(id) = config.bot.application_id {
        client = client.application_id(id);
    }
    client
}

/// Waits for Ctrl+C, or SIGTERM on unix.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Cannot listen for SIGTERM"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Cannot listen for Ctrl+C, shutting down");
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Loads and validates configuration, then creates a [`HooklineRuntime`].
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
        }
    }

    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration built in code.
    pub fn merge(mut self, config: HooklineConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    pub fn build(self) -> RuntimeResult<HooklineRuntime> {
        let config = self.config_loader.load()?;
        validate_config(&config)?;
        HooklineRuntime::from_config(config)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookline_framework::Command;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> HooklineConfig {
        let mut config = HooklineConfig::default();
        config.bot.token = "token".to_string();
        config.bot.application_id = Some(1234);
        config.http.base_url = base_url.to_string();
        config.http.max_attempts = 1;
        config.server.port = 0;
        config
    }

    async fn mock_me(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v10/users/@me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "80351110224678912",
                "username": "hookline",
                "discriminator": "0",
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_token_is_required() {
        let mut config = HooklineConfig::default();
        config.bot.token.clear();
        assert!(matches!(
            HooklineRuntime::from_config(config),
            Err(RuntimeError::Config(ConfigError::MissingField { field })) if field == "bot.token"
        ));
    }

    #[test]
    fn test_bad_public_key() {
        let mut config = config("http://127.0.0.1:1");
        config.bot.public_key = Some("not hex".to_string());
        assert!(matches!(
            HooklineRuntime::from_config(config),
            Err(RuntimeError::Key(_))
        ));
    }

    #[tokio::test]
    async fn test_start_marks_ready_and_syncs_commands() {
        let server = MockServer::start().await;
        mock_me(&server).await;
        Mock::given(method("PUT"))
            .and(path("/v10/applications/1234/guilds/55/commands"))
            .and(body_json(json!([{
                "name": "ping",
                "type": 1,
                "description": "Replies with pong",
                "options": [],
                "default_member_permissions": null,
                "nsfw": false,
            }])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config(&server.uri());
        config.bot.sync_commands = true;
        config.bot.sync_guild = Some(55);
        let runtime = HooklineRuntime::from_config(config).unwrap();
        let dispatcher = runtime
            .dispatcher()
            .command(Command::new("ping", "Replies with pong"))
            .build();

        assert!(!dispatcher.is_ready());
        runtime.start(&dispatcher).await.unwrap();
        assert!(dispatcher.is_ready());
    }

    #[tokio::test]
    async fn test_start_fails_without_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v10/users/@me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "message": "401: Unauthorized",
                "code": 0,
            })))
            .mount(&server)
            .await;

        let runtime = HooklineRuntime::from_config(config(&server.uri())).unwrap();
        let dispatcher = runtime.dispatcher().build();
        assert!(matches!(
            runtime.start(&dispatcher).await,
            Err(RuntimeError::Http(_))
        ));
        assert!(!dispatcher.is_ready());
    }

    #[tokio::test]
    async fn test_endpoint_failure_ends_the_wait() {
        let mut serving = tokio::spawn(async {
            Err::<(), _>(io::Error::new(io::ErrorKind::BrokenPipe, "listener closed"))
        });
        let ended = wait_while_serving(&mut serving, std::future::pending()).await;
        assert!(matches!(ended, Some(Ok(Err(e))) if e.kind() == io::ErrorKind::BrokenPipe));

        let mut serving = tokio::spawn(std::future::pending::<io::Result<()>>());
        assert!(wait_while_serving(&mut serving, async {}).await.is_none());
        serving.abort();
    }

    #[tokio::test]
    async fn test_run_until_shuts_dispatcher_down() {
        let server = MockServer::start().await;
        mock_me(&server).await;

        let runtime = HooklineRuntime::from_config(config(&server.uri())).unwrap();
        let dispatcher = runtime.dispatcher().build();
        let token = dispatcher.cancellation_token();

        runtime
            .run_until(dispatcher.clone(), async {})
            .await
            .unwrap();
        assert!(dispatcher.is_ready());
        assert!(token.is_cancelled());
    }
}
