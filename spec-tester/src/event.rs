//! Things that can happen on a connection.

use std::fmt;

use h2probe_wire::Frame;

/// One observed occurrence, produced by [`Conn::wait_event`].
///
/// [`Conn::wait_event`]: crate::connection::Conn::wait_event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Frame(Frame),
    /// The peer closed or reset the transport.
    ConnectionClosed,
    /// No complete frame arrived before the read deadline.
    Timeout,
    /// A frame could not be parsed, or the transport failed.
    Error(String),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Frame(frame) => match frame {
                Frame::Data(_) => EventKind::DataFrame,
                Frame::Headers(_) => EventKind::HeadersFrame,
                Frame::Priority(_) => EventKind::PriorityFrame,
                Frame::RstStream(_) => EventKind::RstStreamFrame,
                Frame::Settings(_) => EventKind::SettingsFrame,
                Frame::PushPromise(_) => EventKind::PushPromiseFrame,
                Frame::Ping(_) => EventKind::PingFrame,
                Frame::GoAway(_) => EventKind::GoAwayFrame,
                Frame::WindowUpdate(_) => EventKind::WindowUpdateFrame,
                Frame::Continuation(_) => EventKind::ContinuationFrame,
                Frame::Unknown(_) => EventKind::UnknownFrame,
            },
            Event::ConnectionClosed => EventKind::ConnectionClosed,
            Event::Timeout => EventKind::Timeout,
            Event::Error(_) => EventKind::Error,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Frame(frame) => write!(f, "{frame}"),
            Event::ConnectionClosed => f.write_str("Connection closed"),
            Event::Timeout => f.write_str("Timeout"),
            Event::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}

/// Discriminant of [`Event`], for "wait until one of these arrives".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DataFrame,
    HeadersFrame,
    PriorityFrame,
    RstStreamFrame,
    SettingsFrame,
    PushPromiseFrame,
    PingFrame,
    GoAwayFrame,
    WindowUpdateFrame,
    ContinuationFrame,
    UnknownFrame,
    ConnectionClosed,
    Timeout,
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::DataFrame => "DATA Frame",
            EventKind::HeadersFrame => "HEADERS Frame",
            EventKind::PriorityFrame => "PRIORITY Frame",
            EventKind::RstStreamFrame => "RST_STREAM Frame",
            EventKind::SettingsFrame => "SETTINGS Frame",
            EventKind::PushPromiseFrame => "PUSH_PROMISE Frame",
            EventKind::PingFrame => "PING Frame",
            EventKind::GoAwayFrame => "GOAWAY Frame",
            EventKind::WindowUpdateFrame => "WINDOW_UPDATE Frame",
            EventKind::ContinuationFrame => "CONTINUATION Frame",
            EventKind::UnknownFrame => "Unknown Frame",
            EventKind::ConnectionClosed => "Connection closed",
            EventKind::Timeout => "Timeout",
            EventKind::Error => "Error",
        })
    }
}
