use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use track_bus::{ConnectInfo, pacer::frame_interval};

/// Joins a room as a participant and publishes tracks into it.
#[derive(Debug, Parser)]
#[command(name = "room-join", version)]
pub struct Args {
    /// Room server URL
    #[arg(long, env = "LIVEKIT_URL", default_value = "ws://localhost:7880")]
    pub url: String,

    #[arg(long, env = "LIVEKIT_API_KEY")]
    pub api_key: String,

    #[arg(long, env = "LIVEKIT_API_SECRET", hide_env_values = true)]
    pub api_secret: String,

    #[arg(long)]
    pub room: String,

    #[arg(long)]
    pub identity: String,

    /// Publish the looping simulcast demo video
    #[arg(long)]
    pub publish_demo: bool,

    /// File to publish as a track (.h264, .ivf, .ogg); repeatable
    #[arg(long = "publish-file", value_name = "PATH")]
    pub publish_files: Vec<PathBuf>,

    /// Publish stdin as a single track of this type
    /// (video/h264, video/vp8, audio/opus)
    #[arg(long, value_name = "MIME")]
    pub publish_stdin: Option<String>,

    /// Unix socket to publish as a track; the address must contain h264, vp8
    /// or opus. Repeatable
    #[arg(long = "publish-socket", value_name = "ADDR")]
    pub publish_sockets: Vec<String>,

    /// Frame rate for published video
    #[arg(long)]
    pub fps: Option<f64>,

    /// Debug logging for the publishing pipeline
    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated run configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinConfig {
    pub connect: ConnectInfo,
    pub publish_demo: bool,
    pub files: Vec<PathBuf>,
    pub stdin_mime: Option<String>,
    pub sockets: Vec<String>,
    pub fps: Option<f64>,
    pub verbose: bool,
}

impl JoinConfig {
    /// Number of tracks (or simulcast groups) the run will try to publish.
    pub fn requested(&self) -> usize {
        usize::from(self.publish_demo)
            + self.files.len()
            + usize::from(self.stdin_mime.is_some())
            + self.sockets.len()
    }
}

impl TryFrom<Args> for JoinConfig {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> anyhow::Result<Self> {
        if args.room.trim().is_empty() {
            bail!("--room must not be empty");
        }
        if args.identity.trim().is_empty() {
            bail!("--identity must not be empty");
        }
        if let Some(fps) = args.fps {
            if fps.is_finite() && fps > 0.0 && frame_interval(fps).is_none() {
                bail!("--fps {} is outside the range that can be paced", fps);
            }
        }

        Ok(Self {
            connect: ConnectInfo {
                url: args.url,
                api_key: args.api_key,
                api_secret: args.api_secret,
                room_name: args.room,
                identity: args.identity,
            },
            publish_demo: args.publish_demo,
            files: args.publish_files,
            stdin_mime: args.publish_stdin.filter(|m| !m.is_empty()),
            sockets: args.publish_sockets,
            // zero, negative or non-finite rates mean unpaced
            fps: args.fps.filter(|f| f.is_finite() && *f > 0.0),
            verbose: args.verbose,
        })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
