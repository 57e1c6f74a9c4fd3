use crate::error::{Result, ScanError};

/// Loudness weighting role of one interleaved channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    Left,
    Right,
    Center,
    LeftSurround,
    RightSurround,
    /// Present in the stream but ignored by the loudness measurement (LFE)
    Unused,
}

impl From<ChannelRole> for ebur128::Channel {
    fn from(role: ChannelRole) -> Self {
        match role {
            ChannelRole::Left => ebur128::Channel::Left,
            ChannelRole::Right => ebur128::Channel::Right,
            ChannelRole::Center => ebur128::Channel::Center,
            ChannelRole::LeftSurround => ebur128::Channel::LeftSurround,
            ChannelRole::RightSurround => ebur128::Channel::RightSurround,
            ChannelRole::Unused => ebur128::Channel::Unused,
        }
    }
}

use ChannelRole::*;

const MONO: &[ChannelRole] = &[Center];
const STEREO: &[ChannelRole] = &[Left, Right];
const THREE: &[ChannelRole] = &[Left, Right, Center];
const QUAD: &[ChannelRole] = &[Left, Right, LeftSurround, RightSurround];
const FIVE: &[ChannelRole] = &[Left, Right, Center, LeftSurround, RightSurround];
// LFE is excluded from loudness, see EBU Tech 3341
const FIVE_ONE: &[ChannelRole] = &[Left, Right, Center, Unused, LeftSurround, RightSurround];

/// Resolve the channel roles for an interleaved stream with `channels` channels.
pub fn channel_map(channels: usize) -> Result<&'static [ChannelRole]> {
    match channels {
        1 => Ok(MONO),
        2 => Ok(STEREO),
        3 => Ok(THREE),
        4 => Ok(QUAD),
        5 => Ok(FIVE),
        6 => Ok(FIVE_ONE),
        n => Err(ScanError::UnsupportedChannelCount(n)),
    }
}
