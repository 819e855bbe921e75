//! Software model of the Graphics Synthesizer.
//!
//! The GS is split the same way the hardware is: a privileged register
//! bank the CPU talks to directly, a drawing register file fed through
//! the GIF ([`GsState::write64`]), 4 MiB of block-swizzled local memory,
//! and the rasterizer itself. All drawing state lives on a worker
//! thread; the emulator side holds a [`GsHandle`] and communicates over
//! a bounded in-order command ring.

mod context;
mod display;
mod math;
mod mem;
mod raster;
mod regs;
mod state;
mod texture;
mod thread;
mod transfer;
mod vertex;

pub use context::{Alpha, Clamp, Frame, GsContext, Scissor, Test, Tex0, XyOffset, Zbuf};
pub use mem::LocalMemory;
pub use regs::PrivRegisters;
pub use state::GsState;
pub use thread::{GsHandle, GsMessage, GsReply, RING_CAPACITY, SCANOUT_PIXELS};
pub use vertex::{PrimAttrs, PrimType, Rgbaq, Uv, Vertex};

use thiserror::Error;

/// Fatal GS decode failures. These halt the worker thread and surface to
/// the emulator loop as a death reply; nothing here is recoverable by the
/// guest.
#[derive(Debug, Clone, Error)]
pub enum GsError {
    #[error("write to unrecognized GS register ${addr:02X}: ${value:016X}")]
    UnknownRegister { addr: u32, value: u64 },

    #[error("vertex kick with prohibited primitive type")]
    ProhibitedPrimitive,

    #[error("unrecognized zbuf format ${0:02X}")]
    UnknownZbufFormat(u8),

    #[error("unrecognized texture format ${0:02X}")]
    UnknownTextureFormat(u8),

    #[error("unrecognized CLUT format ${0:02X}")]
    UnknownClutFormat(u8),

    #[error("unrecognized transfer format ${0:02X}")]
    UnknownTransferFormat(u8),

    #[error("GS thread terminated: {0}")]
    ThreadDead(String),
}
