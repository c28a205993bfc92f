use anyhow::Result;
use tracing::instrument;
use xcb::{
    screensaver::{QueryInfo, QueryInfoReply, State},
    x::{Drawable, Window},
    Connection,
};

use super::IdleProbe;

pub struct X11IdleProbe {
    connection: Connection,
    preferred_screen: i32,
}

impl X11IdleProbe {
    pub fn new() -> Result<Self> {
        let (connection, preferred_screen) = xcb::Connection::connect(None)?;
        Ok(Self {
            connection,
            preferred_screen,
        })
    }

    fn root_window(&self) -> Window {
        let setup = self.connection.get_setup();

        // Currently the application only supports 1 x11 screen.
        setup
            .roots()
            .nth(self.preferred_screen.max(0) as usize)
            .unwrap()
            .root()
    }

    fn query_info(&self) -> Result<QueryInfoReply> {
        let cookie = self.connection.send_request(&QueryInfo {
            drawable: Drawable::Window(self.root_window()),
        });
        Ok(self.connection.wait_for_reply(cookie)?)
    }
}

impl IdleProbe for X11IdleProbe {
    #[instrument(skip(self))]
    fn screensaver_active(&mut self) -> Result<bool> {
        let reply = self.query_info()?;
        Ok(reply.state() as u32 == State::On as u32)
    }

    #[instrument(skip(self))]
    fn idle_time(&mut self) -> Result<u32> {
        let reply = self.query_info()?;
        Ok(reply.ms_since_user_input())
    }
}
