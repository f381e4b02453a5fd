//! The transport seam: anything the session reads bytes from and writes
//! bytes to, typically a TLS stream. Kept as a blanket impl over the
//! standard async IO traits rather than a bespoke trait so any `tokio`
//! transport — a raw `TcpStream`, a TLS wrapper, `tokio::io::DuplexStream`
//! in tests — works without an adapter.

use tokio::io::{AsyncRead, AsyncWrite};

/// A duplex, ordered, reliable byte stream. The session owns its
/// transport exclusively: only the read activity reads from it and only
/// the write activity writes to it (§5).
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}
