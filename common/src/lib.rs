//! Everything both ends of the serial link agree on: the packed color value and the
//! command vocabulary with its two framings.

#![no_std]

pub mod color;
pub mod comm_messages;
