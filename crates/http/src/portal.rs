//! Static HTML portal page.

use bytes::Bytes;
use hyper::{header, Response};

use latency_catalog::{Catalog, CelestialObject};

use crate::{full_body, BoxBody};

pub fn render(body: &CelestialObject, catalog: &Catalog) -> Response<BoxBody> {
    let mut list = String::new();
    for object in catalog.all() {
        list.push_str(&format!("<li>{}</li>", object.name));
    }

    let html = format!(
        "<!doctype html><html><head><title>latency.space - {name}</title></head>\
         <body><h1>{name}</h1>\
         <p>Traffic routed through this hostname is delayed by the current \
         one-way light-time between Earth and {name}.</p>\
         <h2>Available bodies</h2><ul>{list}</ul></body></html>",
        name = body.name,
        list = list,
    );

    let mut resp = Response::new(full_body(Bytes::from(html)));
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/html; charset=utf-8"));
    resp
}
