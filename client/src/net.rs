use tokio::io::{AsyncRead, AsyncWrite};

use comms::{
    WireReceiver, WireSender,
    msg::{Command, Msg},
    specs::{FetchSpec, SubmitSpec},
};
use model::{ContributionId, ModelDefinition};

use crate::error::{ClientErr, Result};

/// Coordinator client wrapper.
///
/// Contract (current protocol):
/// - `FetchDefinition` is answered by a `Definition` frame
/// - `Submit` + `Contribution` are answered by one `Accepted` command
/// - any request may instead be answered by an `Err` frame
pub struct CoordClient<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    rx: WireReceiver<R>,
    tx: WireSender<W>,
}

impl<R, W> CoordClient<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(rx: WireReceiver<R>, tx: WireSender<W>) -> Self {
        Self { rx, tx }
    }

    /// Fetches and parses a project's model definition.
    pub async fn fetch_definition(&mut self, token: &str, project: &str) -> Result<ModelDefinition> {
        let spec = FetchSpec {
            token: token.to_string(),
            project: project.to_string(),
        };
        self.tx
            .send(&Msg::Control(Command::FetchDefinition(spec)))
            .await?;

        let reply: Msg = self.rx.recv().await?;
        match reply {
            Msg::Definition(text) => Ok(ModelDefinition::from_json(&text)?),
            Msg::Err(rejection) => Err(ClientErr::Rejected(rejection)),
            other => Err(unexpected(&other)),
        }
    }

    /// Uploads one contribution and waits for the coordinator's verdict.
    ///
    /// # Returns
    /// The accepted content identifier, or the coordinator's structured
    /// rejection.
    pub async fn submit(&mut self, spec: SubmitSpec, payload: &[u8]) -> Result<ContributionId> {
        self.tx.send(&Msg::Control(Command::Submit(spec))).await?;
        self.tx.send(&Msg::Contribution(payload)).await?;

        let reply: Msg = self.rx.recv().await?;
        match reply {
            Msg::Control(Command::Accepted { id }) => Ok(id.parse()?),
            Msg::Err(rejection) => Err(ClientErr::Rejected(rejection)),
            other => Err(unexpected(&other)),
        }
    }

    /// Announces a graceful shutdown to the coordinator.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.tx.send(&Msg::Control(Command::Disconnect)).await?;
        Ok(())
    }
}

fn unexpected(msg: &Msg<'_>) -> ClientErr {
    let got = match msg {
        Msg::Control(_) => "control",
        Msg::Definition(_) => "definition",
        Msg::Contribution(_) => "contribution",
        Msg::Err(_) => "err",
    };

    ClientErr::UnexpectedMessage { got }
}
