use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info};

use crate::config::Limits;
use crate::http::connection::{Connection, ConnectionState, Progress};
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;

const READ_CHUNK: usize = 4096;

/// Drives one [`Connection`] over a byte stream: read, feed, write once,
/// close.
pub struct Session<S> {
    stream: S,
    conn: Connection,
    limits: Limits,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, conn: Connection, limits: Limits) -> Self {
        Self {
            stream,
            conn,
            limits,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Serves the connection to completion.
    ///
    /// A peer that hangs up before a response is ready is dropped silently.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let id = self.conn.id();

        let Some(response) = self.read_until_response().await? else {
            debug!(connection = %id, state = ?self.conn.state(), "Peer hung up, abandoning connection");
            return Ok(());
        };

        info!(
            connection = %id,
            status = response.status.as_u16(),
            bytes = response.body.len(),
            "Sending response"
        );

        let mut writer = ResponseWriter::new(&response);
        writer.write_to_stream(&mut self.stream).await?;
        self.stream.shutdown().await?;

        Ok(())
    }

    async fn read_until_response(&mut self) -> anyhow::Result<Option<Response>> {
        let mut phase = self.conn.state();
        let mut deadline = Instant::now() + self.limits.header_timeout();
        let mut temp = [0u8; READ_CHUNK];

        loop {
            let read = timeout_at(deadline, self.stream.read(&mut temp)).await;

            let progress = match read {
                Err(_) => self.conn.timed_out(),
                Ok(Ok(0)) => return Ok(None),
                Ok(Ok(n)) => self.conn.feed(&temp[..n]),
                Ok(Err(e)) => return Err(e.into()),
            };

            match progress {
                Progress::Pending => {}
                Progress::Respond(response) => return Ok(Some(response)),
                Progress::Deferred(pending) => {
                    return Ok(Some(pending.wait(self.limits.page_timeout()).await));
                }
                Progress::Finished => return Ok(None),
            }

            // Each phase gets its own budget.
            if self.conn.state() != phase {
                phase = self.conn.state();
                if phase == ConnectionState::ReceivingBody {
                    deadline = Instant::now() + self.limits.body_timeout();
                }
            }
        }
    }
}
