// ABOUTME: Builds the synchronization pipeline for one session and logs its changes
// ABOUTME: Runs until Ctrl-C, then closes both adapters before returning

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use crs_config::SyncConfig;
use crs_patch::{ChannelTelemetrySink, FanoutTelemetrySink, PatchMetrics, TracingTelemetrySink};
use crs_render::{RenderTracker, RenderUpdate};
use crs_store::{DocumentChange, DocumentStore, RestPersistence};
use crs_transport::{
    SocketAdapter, SocketNotice, SseStreamSource, StreamAdapter, WebSocketTransport,
};
use tokio::signal;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use crate::args::Args;

const NOTICE_CAPACITY: usize = 32;

pub async fn run(args: Args, config: SyncConfig) -> anyhow::Result<()> {
    let mut persistence = RestPersistence::new(config.api_url.clone(), config.http_timeout)
        .context("Failed to build REST client")?;
    if let Some(token) = &args.token {
        persistence = persistence.with_access_token(token.clone());
    }

    let (channel_sink, mut telemetry) = ChannelTelemetrySink::new(config.telemetry_buffer);
    let sink = FanoutTelemetrySink::new()
        .with(Arc::new(TracingTelemetrySink))
        .with(Arc::new(channel_sink));
    let store = Arc::new(
        DocumentStore::new(Arc::new(persistence), config.change_channel_capacity)
            .with_telemetry(Arc::new(sink)),
    );
    let mut changes = store.subscribe();

    match store.reload(args.reload_target()).await {
        Ok(Some(document)) => info!(
            document_id = document.id,
            edit_version = document.edit_version,
            "Loaded document"
        ),
        Ok(None) => info!(project_id = args.project, "No document yet for project"),
        Err(err) => warn!(error = %err, "Initial load failed, waiting for live updates"),
    }

    let stream = if args.no_stream {
        None
    } else {
        let mut source = SseStreamSource::new(config.api_url.clone(), config.http_timeout)
            .context("Failed to build stream client")?;
        if let Some(token) = &args.token {
            source = source.with_access_token(token.clone());
        }
        let adapter = StreamAdapter::new(
            args.chat_session,
            Arc::new(source),
            store.clone(),
            config.stream.clone(),
        );
        adapter.open()?;
        Some(adapter)
    };

    let socket = if args.no_socket {
        None
    } else {
        let mut transport = WebSocketTransport::new(config.ws_url.clone());
        if let Some(token) = &args.token {
            transport = transport.with_access_token(token.clone());
        }
        let adapter = SocketAdapter::new(
            args.chat_session,
            Arc::new(transport),
            store.clone(),
            NOTICE_CAPACITY,
        );
        if let Err(err) = adapter.connect().await {
            warn!(error = %err, "Chat socket unavailable, continuing without it");
        }
        Some(adapter)
    };
    let mut notices = socket.as_ref().map(SocketAdapter::notices);

    let mut tracker = RenderTracker::from_config(&config.render);
    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(err) = result {
                    warn!(error = %err, "Failed to listen for Ctrl-C");
                }
                info!("Shutting down");
                break;
            }
            change = changes.recv() => match change {
                Ok(change) => {
                    let update = tracker.observe(&change, Instant::now());
                    log_change(&change, &update);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Change feed lagged");
                }
                Err(RecvError::Closed) => break,
            },
            Some(metrics) = telemetry.recv() => log_metrics(&metrics),
            notice = next_notice(&mut notices) => match notice {
                Ok(notice) => log_notice(&notice),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Notice feed lagged"),
                Err(RecvError::Closed) => notices = None,
            },
        }
    }

    if let Some(adapter) = &stream {
        adapter.close();
    }
    if let Some(adapter) = &socket {
        adapter.close();
    }
    Ok(())
}

async fn next_notice(
    notices: &mut Option<broadcast::Receiver<SocketNotice>>,
) -> Result<SocketNotice, RecvError> {
    match notices {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn log_change(change: &DocumentChange, update: &RenderUpdate) {
    info!(
        source = ?change.source,
        document_id = ?change.document_id(),
        edit_version = ?change.edit_version(),
        changed = ?update.changed_paths,
        highlighted = ?update.highlighted,
        active_field = ?update.active_field,
        "Document changed"
    );
}

fn log_metrics(metrics: &PatchMetrics) {
    if metrics.fallback_to_full {
        info!(
            document_id = metrics.document_id,
            mode = ?metrics.mode,
            reason = ?metrics.failure_reason,
            "Remote update used full content"
        );
    }
}

fn log_notice(notice: &SocketNotice) {
    match notice {
        SocketNotice::Chat(message) => {
            info!(role = ?message.role, content = %message.content, "Chat message")
        }
        SocketNotice::Typing(typing) => info!(typing, "Assistant typing"),
        SocketNotice::ServerError(message) => warn!(error = %message, "Server error"),
        SocketNotice::GenerationComplete => info!("Generation complete"),
    }
}
