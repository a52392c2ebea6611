//! HTTP API for the lectio narration service.
//!
//! Runs on port 2003 by default. CORS-permissive so the reading web app can
//! call it from its own origin.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tracing::warn;

use lectio_core::types::{ArticlePage, NarrationStatus, ParagraphId};

use crate::error::Error;
use crate::pages::PageSource;
use crate::service::NarrationService;
use crate::session::ReadingSession;

/// Build the axum router over a shared [`ReadingSession`].
pub fn router<S: PageSource>(session: ReadingSession<S>) -> Router {
    Router::new()
        .route("/articles/{article}/pages/{page}", post(open_page::<S>))
        .route("/pages/next", post(next_page::<S>))
        .route("/pages/previous", post(previous_page::<S>))
        .route("/narration/start", post(start::<S>))
        .route("/narration/stop", post(stop_narration::<S>))
        .route("/paragraphs/{id}/play", post(play_paragraph::<S>))
        .route("/stop", post(stop::<S>))
        .route("/status", get(status::<S>))
        .route("/events", get(events::<S>))
        .layer(CorsLayer::permissive())
        .with_state(session)
}

#[derive(serde::Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(serde::Serialize)]
struct PageResponse {
    ok: bool,
    page: u32,
    paragraphs: usize,
    has_next: bool,
}

impl From<ArticlePage> for PageResponse {
    fn from(page: ArticlePage) -> Self {
        Self {
            ok: true,
            page: page.page,
            paragraphs: page.paragraphs.len(),
            has_next: page.has_next,
        }
    }
}

#[derive(serde::Serialize)]
struct ErrorResponse {
    ok: bool,
    error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NoArticle => StatusCode::CONFLICT,
            Error::FirstPage | Error::LastPage(_) => StatusCode::BAD_REQUEST,
            Error::Status { status, .. } if *status == StatusCode::NOT_FOUND => {
                StatusCode::NOT_FOUND
            }
            Error::Status { .. } | Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::ServiceClosed => StatusCode::SERVICE_UNAVAILABLE,
            Error::InvalidUrl(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            ok: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type PageResult = Result<Json<PageResponse>, Error>;

async fn open_page<S: PageSource>(
    State(session): State<ReadingSession<S>>,
    Path((article, page)): Path<(String, u32)>,
) -> PageResult {
    Ok(Json(session.open(&article, page).await?.into()))
}

async fn next_page<S: PageSource>(State(session): State<ReadingSession<S>>) -> PageResult {
    Ok(Json(session.next_page().await?.into()))
}

async fn previous_page<S: PageSource>(State(session): State<ReadingSession<S>>) -> PageResult {
    Ok(Json(session.previous_page().await?.into()))
}

fn control<S: PageSource>(
    session: &ReadingSession<S>,
    f: impl FnOnce(&NarrationService),
) -> Result<Json<OkResponse>, Error> {
    let service = session.service();
    if service.is_closed() {
        return Err(Error::ServiceClosed);
    }
    f(service);
    Ok(Json(OkResponse { ok: true }))
}

async fn start<S: PageSource>(
    State(session): State<ReadingSession<S>>,
) -> Result<Json<OkResponse>, Error> {
    control(&session, |s| s.start_whole_document())
}

async fn stop_narration<S: PageSource>(
    State(session): State<ReadingSession<S>>,
) -> Result<Json<OkResponse>, Error> {
    control(&session, |s| s.stop_whole_document())
}

async fn play_paragraph<S: PageSource>(
    State(session): State<ReadingSession<S>>,
    Path(id): Path<u64>,
) -> Result<Json<OkResponse>, Error> {
    control(&session, |s| s.play_paragraph(ParagraphId(id)))
}

async fn stop<S: PageSource>(
    State(session): State<ReadingSession<S>>,
) -> Result<Json<OkResponse>, Error> {
    control(&session, |s| s.stop())
}

async fn status<S: PageSource>(State(session): State<ReadingSession<S>>) -> Json<NarrationStatus> {
    Json(session.service().status())
}

/// Server-sent events, one JSON payload per narration event.
async fn events<S: PageSource>(
    State(session): State<ReadingSession<S>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = session.service().subscribe_events();
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(ev) => match Event::default().event(ev.kind()).json_data(&ev) {
                    Ok(event) => return Some((Ok::<_, Infallible>(event), rx)),
                    Err(e) => warn!("sse: failed to encode {}: {e}", ev.kind()),
                },
                Err(RecvError::Lagged(n)) => warn!("sse: subscriber lagged, {n} events dropped"),
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
