use crux_core::render::Render;
use crux_http::Http;

use crate::app::{App, Event};

pub type AppHttp = Http<Event>;
pub type AppRender = Render<Event>;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
}
