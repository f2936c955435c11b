//! Client connection to the movement server and its tick loop

use crate::config::ClientConfig;
use crate::game::ClientGame;
use crate::input::{IdleInput, InputManager, InputSource, WanderInput};
use log::{debug, info, warn};
use shared::protocol::Frame;
use shared::transport::{read_frame, write_frame};
use shared::{HeadlessPresentation, Message};
use std::error::Error;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub struct Client {
    writer: OwnedWriteHalf,
    frame_rx: mpsc::UnboundedReceiver<Frame>,
    reader_task: JoinHandle<()>,

    game: ClientGame<HeadlessPresentation>,
    input_manager: InputManager,
    config: ClientConfig,
}

impl Client {
    /// Connects with the input source the config asks for
    pub async fn connect(config: ClientConfig) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let source: Box<dyn InputSource> = match (config.bot, config.seed) {
            (true, Some(seed)) => Box::new(WanderInput::with_seed(seed)),
            (true, None) => Box::new(WanderInput::new()),
            (false, _) => Box::new(IdleInput),
        };
        Self::connect_with_input(config, source).await
    }

    pub async fn connect_with_input(
        config: ClientConfig,
        source: Box<dyn InputSource>,
    ) -> Result<Self, Box<dyn Error + Send + Sync>> {
        info!("Connecting to {}...", config.server_addr);
        let stream = TcpStream::connect(&config.server_addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, writer) = stream.into_split();

        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let reader_task = tokio::spawn(Self::read_loop(read_half, frame_tx));

        let game = ClientGame::new(HeadlessPresentation::new())
            .with_interpolation(config.interpolation);
        let input_manager = InputManager::new(source, config.heartbeat_interval);

        Ok(Client {
            writer,
            frame_rx,
            reader_task,
            game,
            input_manager,
            config,
        })
    }

    /// Forwards server frames until the connection closes. Dropping the
    /// sender tells the tick loop the server is gone.
    async fn read_loop(mut read_half: OwnedReadHalf, frame_tx: mpsc::UnboundedSender<Frame>) {
        loop {
            match read_frame(&mut read_half).await {
                Ok(Some(frame)) => {
                    if frame_tx.send(frame).is_err() {
                        return;
                    }
                }
                Ok(None) => {
                    info!("Server closed the connection");
                    return;
                }
                Err(e) => {
                    warn!("Error reading from server: {}", e);
                    return;
                }
            }
        }
    }

    pub fn game(&self) -> &ClientGame<HeadlessPresentation> {
        &self.game
    }

    async fn send(&mut self, message: &Message) -> Result<(), Box<dyn Error + Send + Sync>> {
        let frame = message.encode()?;
        write_frame(&mut self.writer, &frame).await?;
        Ok(())
    }

    /// Applies every frame received so far. Returns false once the server
    /// connection is closed and fully drained.
    fn drain_frames(&mut self) -> bool {
        loop {
            match self.frame_rx.try_recv() {
                Ok(frame) => self.game.handle_frame(&frame),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Runs one client tick
    ///
    /// Drains server frames, advances interpolation, then sends this tick's
    /// movement intent or heartbeat. Nothing is sent before the server has
    /// told us who we are. Returns false once the server has gone away or
    /// stopped accepting frames.
    pub async fn tick(&mut self) -> bool {
        let open = self.drain_frames();
        self.game.advance(self.config.tick_duration);

        if !open {
            return false;
        }

        if self.game.my_name().is_some() {
            if let Some(message) = self.input_manager.update() {
                debug!("Sending {}", message.kind());
                if let Err(e) = self.send(&message).await {
                    warn!("Failed to send {} to server: {}", message.kind(), e);
                    return false;
                }
            }
        }

        true
    }

    /// Ticks until the server closes the connection
    pub async fn run(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut tick_interval = interval(self.config.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.tick().await {
            tick_interval.tick().await;
        }

        info!(
            "Disconnected after sending {} movement intents",
            self.input_manager.intents_sent()
        );
        self.game.reset();
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}
