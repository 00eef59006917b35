use anyhow::Context;
use embedded_svc::{
    http::{
        server::{Connection, HandlerResult, Request},
        Headers, Method, Query,
    },
    io::{Read, Write},
    ota::{Ota, OtaUpdate},
};
use envstation::{
    actor::Client,
    endpoint,
    update::{UpdateError, UpdateEvent, UpdateKind},
    StationConfig,
};
use esp_idf_svc::{
    http::server::{Configuration, EspHttpServer},
    ota::EspOta,
};
use std::sync::mpsc;

pub type EndpointClient = Client<endpoint::Request, endpoint::Response>;

const OTA_CHUNK_SIZE: usize = 1024;

/// Starts the HTTP server.
///
/// Every route other than `/update` is answered by the station's endpoint;
/// the handlers here only forward the request and copy the response back.
pub fn start_server(
    config: &StationConfig,
    client: EndpointClient,
    updates: Option<mpsc::Sender<UpdateEvent>>,
) -> anyhow::Result<EspHttpServer> {
    let mut server = EspHttpServer::new(&Configuration {
        http_port: config.http_port,
        uri_match_wildcard: true,
        ..Default::default()
    })
    .context("failed to start HTTP server")?;

    // wildcard handlers match in registration order, so the update route has
    // to come first
    if let Some(events) = updates {
        server
            .fn_handler("/update", Method::Post, move |req| {
                receive_update(req, &events)
            })
            .context("adding POST /update handler")?;
    }

    let get = client.clone();
    server
        .fn_handler("/*", Method::Get, move |req| {
            forward(req, &get, endpoint::Method::Get)
        })
        .context("adding GET /* handler")?
        .fn_handler("/*", Method::Post, move |req| {
            forward(req, &client, endpoint::Method::Post)
        })
        .context("adding POST /* handler")?;

    log::info!("Server is running on port {}", config.http_port);

    Ok(server)
}

fn forward<C: Connection>(
    req: Request<C>,
    client: &EndpointClient,
    method: endpoint::Method,
) -> HandlerResult {
    let request = endpoint::Request::parse(method, req.uri());
    let rsp = client
        .request_blocking(request)
        .map_err(|error| anyhow::anyhow!("{error}"))?;
    req.into_response(
        rsp.status,
        None,
        &[(header::CONTENT_TYPE, rsp.content_type)],
    )?
    .write_all(rsp.body.as_bytes())?;
    Ok(())
}

/// Writes the request body to the next OTA slot.
///
/// Progress is reported to the station as [`UpdateEvent`]s; the station's
/// hooks take care of logging and rebooting.
fn receive_update<C: Connection>(
    mut req: Request<C>,
    events: &mpsc::Sender<UpdateEvent>,
) -> HandlerResult {
    let report = |event| {
        if events.send(event).is_err() {
            log::warn!("update monitor is gone; dropping {event:?}");
        }
    };

    let total = req.content_len().unwrap_or(0) as usize;
    report(UpdateEvent::Start(UpdateKind::Firmware));

    match write_image(&mut req, total, &report) {
        Ok(()) => {
            req.into_ok_response()?.write_all(b"OK\n")?;
            report(UpdateEvent::End);
            Ok(())
        }
        Err((kind, error)) => {
            report(UpdateEvent::Error(kind));
            req.into_status_response(500)?
                .write_all(format!("{kind}: {error:?}\n").as_bytes())?;
            Ok(())
        }
    }
}

fn write_image<R: Read>(
    body: &mut R,
    total: usize,
    report: &impl Fn(UpdateEvent),
) -> Result<(), (UpdateError, anyhow::Error)> {
    let mut ota =
        EspOta::new().map_err(|error| (UpdateError::Begin, anyhow::anyhow!("{error:?}")))?;
    let mut update = ota
        .initiate_update()
        .map_err(|error| (UpdateError::Begin, anyhow::anyhow!("{error:?}")))?;

    let mut chunk = [0u8; OTA_CHUNK_SIZE];
    let mut done = 0;
    loop {
        let read = match body.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) => {
                let _ = update.abort();
                return Err((UpdateError::Receive, anyhow::anyhow!("{error:?}")));
            }
        };
        if let Err(error) = update.write_all(&chunk[..read]) {
            let _ = update.abort();
            return Err((UpdateError::Receive, anyhow::anyhow!("{error:?}")));
        }
        done += read;
        report(UpdateEvent::Progress { done, total });
    }

    if done == 0 {
        let _ = update.abort();
        return Err((UpdateError::Receive, anyhow::anyhow!("empty update image")));
    }

    update
        .complete()
        .map_err(|error| (UpdateError::End, anyhow::anyhow!("{error:?}")))
}

mod header {
    pub(super) const CONTENT_TYPE: &str = "content-type";
}
