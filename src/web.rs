use axum::{
    extract::{RawQuery, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tokio::{
    net::TcpListener,
    sync::{oneshot, Notify},
};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::{
    error::{ConfigError, Error, Result},
    kubeconfig::{self, ConfigStore, KubeConfig},
    payload::CredentialPayload,
};

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>KubeSail Config Complete</title>
    <style>
      body {
        font-family: sans-serif;
        display: flex;
        flex-direction: column;
        align-items: center;
        justify-content: center;
        height: 100vh;
        margin: 0;
        color: #131518;
      }
      h2 { font-weight: normal; text-transform: uppercase; }
    </style>
  </head>
  <body>
    <h2>KubeSail is now configured</h2>
    <p>You can close this window and return to your terminal</p>
  </body>
</html>
"#;

type Outcome = std::result::Result<String, ConfigError>;

struct Session {
    store: ConfigStore,
    config: KubeConfig,
    done: Option<oneshot::Sender<Outcome>>,
}

pub struct CallbackState {
    session: Mutex<Session>,
    shutdown: Notify,
}

/// Single-use HTTP endpoint the registration site redirects back to.
pub struct CallbackListener {
    listener: TcpListener,
    addr: SocketAddr,
    state: Arc<CallbackState>,
    outcome: oneshot::Receiver<Outcome>,
}

impl CallbackListener {
    pub async fn bind(addr: &str, store: ConfigStore, config: KubeConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local_addr = listener.local_addr().map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;

        let (done, outcome) = oneshot::channel();
        let state = Arc::new(CallbackState {
            session: Mutex::new(Session {
                store,
                config,
                done: Some(done),
            }),
            shutdown: Notify::new(),
        });

        Ok(Self {
            listener,
            addr: local_addr,
            state,
            outcome,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves until one callback has been merged and saved, then shuts down.
    ///
    /// Returns the name of the context that was written. Malformed callbacks are
    /// answered with an error and do not stop the listener.
    pub async fn run(self) -> Result<String> {
        let CallbackListener {
            listener,
            addr,
            state,
            outcome,
        } = self;

        info!("Waiting for registration callback on http://{}", addr);

        let app = router(Arc::clone(&state));
        let shutdown_state = Arc::clone(&state);
        drop(state);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_state.shutdown.notified().await;
            })
            .await
            .map_err(Error::Serve)?;

        match outcome.await {
            Ok(Ok(context)) => Ok(context),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(Error::Abandoned),
        }
    }
}

fn router(state: Arc<CallbackState>) -> Router {
    Router::new()
        .route("/", get(callback_handler))
        .fallback(callback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn callback_handler(
    State(state): State<Arc<CallbackState>>,
    RawQuery(query): RawQuery,
) -> Response {
    // Saving writes and syncs the file while the session lock is held.
    let query = query.unwrap_or_default();
    tokio::task::spawn_blocking(move || handle_callback(&state, &query))
        .await
        .unwrap_or_else(|e| {
            error!("Callback handler failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

fn handle_callback(state: &CallbackState, query: &str) -> Response {
    let mut session = match state.session.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    if session.done.is_none() {
        return (StatusCode::GONE, "KubeSail is already configured").into_response();
    }

    let credentials = match CredentialPayload::parse(query).and_then(CredentialPayload::validate)
    {
        Ok(credentials) => credentials,
        Err(e) => {
            warn!("Rejected registration callback: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                e.to_string(),
            )
                .into_response();
        }
    };

    let (merged, outcome) = kubeconfig::merge(session.config.clone(), &credentials);
    let saved = session.store.save(&merged);

    let response = match &saved {
        Ok(()) => {
            info!(
                context = %outcome.context,
                replaced = outcome.replaced,
                activated = outcome.activated,
                "Added KubeSail config to {}",
                session.store.path().display()
            );
            session.config = merged;
            Html(SUCCESS_PAGE).into_response()
        }
        Err(e) => {
            error!("Failed to save kubeconfig: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to write kube config, check your terminal",
            )
                .into_response()
        }
    };

    if let Some(done) = session.done.take() {
        let _ = done.send(saved.map(|()| outcome.context));
    }
    state.shutdown.notify_one();

    response
}
