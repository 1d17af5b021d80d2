//! The HTTP front end.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use docfill_docx::Document;
use docfill_std::error::prelude::*;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes, Incoming};
use hyper::header::{
    CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap, HeaderValue, LOCATION, SET_COOKIE,
};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use serde_json::json;
use tokio::sync::oneshot;

use crate::config::ServerConfig;
use crate::fields::field_map;
use crate::flash::{Flash, FlashSigner, clear_cookie};
use crate::form::FormPage;
use crate::generate::{
    DOCX_CONTENT_TYPE, GenerateOutcome, GenerateRequest, MISSING_TEMPLATE_MESSAGE,
    content_disposition, generate,
};
use crate::upload::Upload;

type ResBody = Full<Bytes>;

/// State shared by all requests.
#[derive(Debug)]
pub struct AppState {
    /// The server configuration.
    pub config: ServerConfig,
    flash: FlashSigner,
    form: FormPage,
}

impl AppState {
    /// Prepares the state for a configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        Ok(Self {
            flash: FlashSigner::new(&config.secret_key)?,
            form: FormPage::new()?,
            config,
        })
    }
}

/// created by `make_http_server`
pub struct HttpServer {
    /// The address the server is listening on.
    pub addr: SocketAddr,
    /// The sender to shutdown the server.
    pub shutdown_tx: oneshot::Sender<()>,
    /// The join handle of the server.
    pub join: tokio::task::JoinHandle<()>,
}

/// Binds the configured address and starts serving.
pub async fn make_http_server(state: Arc<AppState>) -> Result<HttpServer> {
    type Server = hyper_util::server::conn::auto::Builder<hyper_util::rt::TokioExecutor>;

    let listener = tokio::net::TcpListener::bind(&state.config.addr)
        .await
        .with_context("bind http server", || {
            Some(vec![("addr", state.config.addr.clone())].into_boxed_slice())
        })?;
    let addr = listener.local_addr().context("http server address")?;
    log::info!("docfill listening on http://{addr}");

    let make_service = move || {
        let state = state.clone();
        service_fn(move |req: Request<Incoming>| {
            let state = state.clone();
            async move { Ok::<_, Infallible>(handle(state, req).await) }
        })
    };

    let (shutdown_tx, rx) = oneshot::channel();
    let graceful = GracefulShutdown::new();

    let serve_conn = move |server: &Server, graceful: &GracefulShutdown, conn| {
        let (stream, _peer_addr) = match conn {
            Ok(conn) => conn,
            Err(e) => {
                log::error!("accept error: {e}");
                return;
            }
        };

        let conn = server.serve_connection(TokioIo::new(stream), make_service());
        let conn = graceful.watch(conn.into_owned());
        tokio::spawn(async move {
            conn.await.log_error("cannot serve http");
        });
    };

    let join = tokio::spawn(async move {
        let mut signal = std::pin::pin!(rx);

        let mut server = Server::new(hyper_util::rt::TokioExecutor::new());
        server.http1().keep_alive(true);

        loop {
            tokio::select! {
                conn = listener.accept() => serve_conn(&server, &graceful, conn),
                _ = &mut signal => {
                    log::info!("graceful shutdown signal received");
                    break;
                }
            }
        }

        tokio::select! {
            _ = graceful.shutdown() => {
                log::info!("gracefully shut down");
            },
            _ = tokio::time::sleep(Duration::from_secs(10)) => {
                log::info!("waited 10 seconds for graceful shutdown, aborting...");
            }
        }
    });

    Ok(HttpServer {
        addr,
        shutdown_tx,
        join,
    })
}

/// Routes a request and turns failures into `500` responses.
pub async fn handle<B>(state: Arc<AppState>, req: Request<B>) -> Response<ResBody>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let start = Instant::now();
    log::debug!("{method} {path}");

    let res = match (&method, path.as_str()) {
        (&Method::GET, "/") => index(&state, req.headers()),
        (&Method::POST, "/gerar") => generate_proposal(state, req).await,
        (&Method::GET, "/debug/scan") => debug_scan(state).await,
        _ => Ok(plain(StatusCode::NOT_FOUND, "not found")),
    };

    let res = res.unwrap_or_else(|err| {
        log::error!("{method} {path} failed: {err}");
        plain(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    });
    log::info!(
        "{method} {path} -> {} in {:?}",
        res.status().as_u16(),
        start.elapsed()
    );
    res
}

fn index(state: &AppState, headers: &HeaderMap) -> Result<Response<ResBody>> {
    let pending = state.flash.pending(headers);
    let messages: Vec<Flash> = pending.clone().flatten().into_iter().collect();

    let html = state.form.render(&messages)?;
    let mut res = Response::new(Full::from(html));
    res.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    if pending.is_some() {
        res.headers_mut().insert(SET_COOKIE, header_value(&clear_cookie())?);
    }
    Ok(res)
}

async fn generate_proposal<B>(state: Arc<AppState>, req: Request<B>) -> Result<Response<ResBody>>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    let boundary = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| multer::parse_boundary(value).ok());
    let Some(boundary) = boundary else {
        return Ok(plain(
            StatusCode::BAD_REQUEST,
            "expected a multipart/form-data body",
        ));
    };

    let body = req
        .into_body()
        .collect()
        .await
        .context_ut("read request body")?
        .to_bytes();
    let form = match read_form(body, boundary).await {
        Ok(form) => form,
        Err(err) => {
            log::warn!("malformed form submission: {err}");
            return Ok(plain(StatusCode::BAD_REQUEST, "malformed form submission"));
        }
    };

    let req = GenerateRequest {
        fields: field_map(&form.values),
        template: form.template,
        logo: form.logo,
    };
    let outcome = {
        let state = state.clone();
        tokio::task::spawn_blocking(move || generate(&state.config, req))
            .await
            .context_ut("join generation task")??
    };

    match outcome {
        GenerateOutcome::Document { filename, data } => {
            let mut res = Response::new(Full::from(data));
            let headers = res.headers_mut();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(DOCX_CONTENT_TYPE));
            headers.insert(
                CONTENT_DISPOSITION,
                header_value(&content_disposition(&filename))?,
            );
            Ok(res)
        }
        GenerateOutcome::MissingTemplate => {
            let flash = Flash::error(MISSING_TEMPLATE_MESSAGE);
            let mut res = Response::new(Full::default());
            *res.status_mut() = StatusCode::FOUND;
            res.headers_mut()
                .insert(LOCATION, HeaderValue::from_static("/"));
            res.headers_mut()
                .insert(SET_COOKIE, header_value(&state.flash.set_cookie(&flash))?);
            Ok(res)
        }
    }
}

async fn debug_scan(state: Arc<AppState>) -> Result<Response<ResBody>> {
    let path = state.config.default_template.clone();
    let found = tokio::task::spawn_blocking(move || -> Result<Option<Vec<String>>> {
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(Document::open(&path)?.placeholders()))
    })
    .await
    .context_ut("join scan task")??;

    match found {
        Some(names) => json_response(
            StatusCode::OK,
            &json!({ "ok": true, "placeholders_encontrados": names }),
        ),
        None => {
            let name = state
                .config
                .default_template
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| state.config.default_template.display().to_string());
            json_response(
                StatusCode::NOT_FOUND,
                &json!({ "ok": false, "error": format!("{name} não encontrado") }),
            )
        }
    }
}

/// The parts of a submitted form.
#[derive(Debug, Default)]
struct FormParts {
    values: HashMap<String, String>,
    template: Option<Upload>,
    logo: Option<Upload>,
}

async fn read_form(body: Bytes, boundary: String) -> Result<FormParts, multer::Error> {
    let stream = futures::stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut form = FormParts::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "template_file" | "logo" => {
                let filename = field.file_name().unwrap_or_default().to_owned();
                let data = field.bytes().await?.to_vec();
                let slot = if name == "logo" {
                    &mut form.logo
                } else {
                    &mut form.template
                };
                slot.get_or_insert(Upload { filename, data });
            }
            _ => {
                let text = field.text().await?;
                form.values.entry(name).or_insert(text);
            }
        }
    }
    Ok(form)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).context_ut("invalid header value")
}

fn plain(status: StatusCode, text: &'static str) -> Response<ResBody> {
    let mut res = Response::new(Full::from(text));
    *res.status_mut() = status;
    res.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    res
}

fn json_response(status: StatusCode, value: &serde_json::Value) -> Result<Response<ResBody>> {
    let body = serde_json::to_vec(value).context("serialize json")?;
    let mut res = Response::new(Full::from(body));
    *res.status_mut() = status;
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(res)
}
