//! Progress and outline notifications.
//!
//! The core never talks to a UI directly. Long operations report progress and
//! tree edits report the node a front end should focus next, all through an
//! [`EventSink`] handed in by the caller.

use std::sync::mpsc::Sender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A progress line for a long-running operation.
    ShowTip(String),
    /// The operation finished; optional closing message.
    HideTip(Option<String>),
    /// A chapter was persisted and received this href.
    ChapterAdded(String),
    /// The outline changed; the href is the suggested focus target.
    TocUpdated(Option<String>),
}

pub trait EventSink {
    fn emit(&mut self, event: Event);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: Event) {}
}

/// Keeps every event in order; handy for inspecting what an operation emitted.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub events: Vec<Event>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The focus target carried by the most recent `TocUpdated`.
    pub fn last_focus(&self) -> Option<Option<&str>> {
        self.events.iter().rev().find_map(|e| match e {
            Event::TocUpdated(href) => Some(href.as_deref()),
            _ => None,
        })
    }
}

impl EventSink for Recorder {
    fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}

/// Forwards events over a channel. A dropped receiver is not an error.
impl EventSink for Sender<Event> {
    fn emit(&mut self, event: Event) {
        let _ = self.send(event);
    }
}

/// Renders progress through the `log` facade, for command-line runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: Event) {
        match event {
            Event::ShowTip(msg) => log::info!("{msg}"),
            Event::HideTip(Some(msg)) => log::info!("{msg}"),
            Event::HideTip(None) => {}
            Event::ChapterAdded(href) => log::debug!("chapter stored as {href}"),
            Event::TocUpdated(focus) => log::debug!("outline updated, focus {focus:?}"),
        }
    }
}
