//! The GS worker thread and the emulator-side handle.
//!
//! All drawing state (including the 4 MiB of local memory) is owned by
//! the worker; the emulator submits commands over a bounded in-order
//! ring and blocks only when the ring is full or a reply is required.
//! Privileged registers are mirrored on the handle so CSR polls never
//! cross the channel.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::{error, info};

use crate::regs::PrivRegisters;
use crate::state::GsState;
use crate::GsError;

/// Command ring depth. The emulator yields when this fills.
pub const RING_CAPACITY: usize = 1 << 16;

/// Scanout buffer size; large enough for any DISPLAY configuration.
pub const SCANOUT_PIXELS: usize = 1920 * 1280;

/// Commands sent from the emulator thread to the GS worker.
#[derive(Debug, Clone)]
pub enum GsMessage {
    Write64 { addr: u32, value: u64 },
    WritePriv64 { addr: u32, value: u64 },
    WritePriv32 { addr: u32, value: u32 },
    SetRgba { r: u8, g: u8, b: u8, a: u8 },
    SetStq { s: u32, t: u32, q: u32 },
    SetUv { u: u16, v: u16 },
    SetXyz { x: u16, y: u16, z: u32, drawing_kick: bool },
    SetXyzf { x: u16, y: u16, z: u32, fog: u8, drawing_kick: bool },
    SetQ(f32),
    SetCrt { interlaced: bool, mode: u8, frame_mode: bool },
    SetVblank(bool),
    AssertFinish,
    /// Scan the display framebuffer out into the given shared buffer.
    RenderCrt { buffer: usize },
    /// Produce the next quadword of an active local→host transfer.
    LocalToHost,
    Die,
}

/// Replies from the worker back to the emulator thread.
#[derive(Debug, Clone)]
pub enum GsReply {
    RenderComplete { buffer: usize, width: u32, height: u32 },
    HostData { quad: u128, done: bool },
    Death(String),
}

fn worker(
    rx: Receiver<GsMessage>,
    reply_tx: SyncSender<GsReply>,
    buffers: [Arc<Mutex<Vec<u32>>>; 2],
) {
    let mut gs = GsState::new();
    info!(target: "gs_t", "GS worker up");
    while let Ok(message) = rx.recv() {
        let result = match message {
            GsMessage::Write64 { addr, value } => gs.write64(addr, value),
            GsMessage::WritePriv64 { addr, value } => {
                gs.regs.write64(addr, value);
                Ok(())
            }
            GsMessage::WritePriv32 { addr, value } => {
                gs.regs.write32(addr, value);
                Ok(())
            }
            GsMessage::SetRgba { r, g, b, a } => {
                gs.set_rgba(r, g, b, a);
                Ok(())
            }
            GsMessage::SetStq { s, t, q } => {
                gs.set_stq(s, t, q);
                Ok(())
            }
            GsMessage::SetUv { u, v } => {
                gs.set_uv(u, v);
                Ok(())
            }
            GsMessage::SetXyz { x, y, z, drawing_kick } => gs.set_xyz(x, y, z, drawing_kick),
            GsMessage::SetXyzf { x, y, z, fog, drawing_kick } => {
                gs.set_xyzf(x, y, z, fog, drawing_kick)
            }
            GsMessage::SetQ(q) => {
                gs.set_q(q);
                Ok(())
            }
            GsMessage::SetCrt { interlaced, mode, frame_mode } => {
                gs.regs.set_crt(interlaced, mode, frame_mode);
                Ok(())
            }
            GsMessage::SetVblank(vblank) => {
                gs.regs.set_vblank(vblank);
                Ok(())
            }
            GsMessage::AssertFinish => {
                gs.regs.assert_finish();
                Ok(())
            }
            GsMessage::RenderCrt { buffer } => {
                let target = &buffers[buffer & 1];
                let (width, height) = {
                    let mut locked = target.lock().expect("scanout buffer poisoned");
                    gs.render_crt(&mut locked)
                };
                let _ = reply_tx.send(GsReply::RenderComplete { buffer: buffer & 1, width, height });
                Ok(())
            }
            GsMessage::LocalToHost => match gs.local_to_host() {
                Ok((quad, done)) => {
                    let _ = reply_tx.send(GsReply::HostData { quad, done });
                    Ok(())
                }
                Err(e) => Err(e),
            },
            GsMessage::Die => break,
        };
        if let Err(e) = result {
            error!(target: "gs_t", "fatal: {e}");
            let _ = reply_tx.send(GsReply::Death(e.to_string()));
            return;
        }
    }
    info!(target: "gs_t", "GS worker down");
}

/// Emulator-side endpoint. Forwards drawing traffic to the worker and
/// answers privileged reads from its own mirror.
pub struct GsHandle {
    tx: SyncSender<GsMessage>,
    reply_rx: Receiver<GsReply>,
    thread: Option<JoinHandle<()>>,
    buffers: [Arc<Mutex<Vec<u32>>>; 2],
    /// Privileged mirror; kept in lockstep with the worker's copy.
    pub regs: PrivRegisters,
}

impl GsHandle {
    pub fn spawn() -> GsHandle {
        let (tx, rx) = sync_channel(RING_CAPACITY);
        let (reply_tx, reply_rx) = sync_channel(64);
        let buffers = [
            Arc::new(Mutex::new(vec![0u32; SCANOUT_PIXELS])),
            Arc::new(Mutex::new(vec![0u32; SCANOUT_PIXELS])),
        ];
        let worker_buffers = [buffers[0].clone(), buffers[1].clone()];
        let thread = std::thread::Builder::new()
            .name("ferrite-gs".into())
            .spawn(move || worker(rx, reply_tx, worker_buffers))
            .expect("spawn GS worker");
        let mut regs = PrivRegisters::default();
        regs.reset();
        GsHandle { tx, reply_rx, thread: Some(thread), buffers, regs }
    }

    fn send(&mut self, message: GsMessage) -> Result<(), GsError> {
        // A full ring means the worker is behind; block until it drains.
        // A disconnected ring means it died; surface the death reply.
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(message)) => {
                self.tx.send(message).map_err(|_| self.death())
            }
            Err(TrySendError::Disconnected(_)) => Err(self.death()),
        }
    }

    fn death(&self) -> GsError {
        for reply in self.reply_rx.try_iter() {
            if let GsReply::Death(msg) = reply {
                return GsError::ThreadDead(msg);
            }
        }
        GsError::ThreadDead("worker hung up".into())
    }

    pub fn write64(&mut self, addr: u32, value: u64) -> Result<(), GsError> {
        self.send(GsMessage::Write64 { addr, value })
    }

    pub fn write64_privileged(&mut self, addr: u32, value: u64) -> Result<(), GsError> {
        self.regs.write64(addr, value);
        self.send(GsMessage::WritePriv64 { addr, value })
    }

    pub fn write32_privileged(&mut self, addr: u32, value: u32) -> Result<(), GsError> {
        self.regs.write32(addr, value);
        self.send(GsMessage::WritePriv32 { addr, value })
    }

    pub fn read64_privileged(&self, addr: u32) -> u64 {
        self.regs.read64(addr)
    }

    pub fn read32_privileged(&self, addr: u32) -> u32 {
        self.regs.read32(addr)
    }

    pub fn set_rgba(&mut self, r: u8, g: u8, b: u8, a: u8) -> Result<(), GsError> {
        self.send(GsMessage::SetRgba { r, g, b, a })
    }

    pub fn set_stq(&mut self, s: u32, t: u32, q: u32) -> Result<(), GsError> {
        self.send(GsMessage::SetStq { s, t, q })
    }

    pub fn set_uv(&mut self, u: u16, v: u16) -> Result<(), GsError> {
        self.send(GsMessage::SetUv { u, v })
    }

    pub fn set_xyz(&mut self, x: u16, y: u16, z: u32, drawing_kick: bool) -> Result<(), GsError> {
        self.send(GsMessage::SetXyz { x, y, z, drawing_kick })
    }

    pub fn set_xyzf(
        &mut self,
        x: u16,
        y: u16,
        z: u32,
        fog: u8,
        drawing_kick: bool,
    ) -> Result<(), GsError> {
        self.send(GsMessage::SetXyzf { x, y, z, fog, drawing_kick })
    }

    pub fn set_q(&mut self, q: f32) -> Result<(), GsError> {
        self.send(GsMessage::SetQ(q))
    }

    pub fn set_crt(&mut self, interlaced: bool, mode: u8, frame_mode: bool) -> Result<(), GsError> {
        self.regs.set_crt(interlaced, mode, frame_mode);
        self.send(GsMessage::SetCrt { interlaced, mode, frame_mode })
    }

    /// Entering/leaving vblank. Returns whether the GS interrupt line
    /// should be raised, computed on the mirror.
    pub fn set_vblank(&mut self, vblank: bool) -> Result<bool, GsError> {
        let irq = self.regs.set_vblank(vblank);
        self.send(GsMessage::SetVblank(vblank))?;
        Ok(irq)
    }

    /// FINISH drew its last pixel. Returns whether to raise the GS line.
    pub fn assert_finish(&mut self) -> Result<bool, GsError> {
        let irq = self.regs.assert_finish();
        self.send(GsMessage::AssertFinish)?;
        Ok(irq)
    }

    /// Request a scanout into buffer `index` and wait for it. All writes
    /// submitted before this call are applied before the read happens.
    pub fn render_crt(&mut self, index: usize) -> Result<(u32, u32), GsError> {
        self.send(GsMessage::RenderCrt { buffer: index & 1 })?;
        loop {
            match self.reply_rx.recv() {
                Ok(GsReply::RenderComplete { width, height, .. }) => return Ok((width, height)),
                Ok(GsReply::Death(msg)) => return Err(GsError::ThreadDead(msg)),
                Ok(_) => continue,
                Err(_) => return Err(GsError::ThreadDead("worker hung up".into())),
            }
        }
    }

    /// Pull the next quadword of an armed local→host transfer. The reply
    /// arrives before the emulator proceeds past the requesting read.
    pub fn local_to_host(&mut self) -> Result<(u128, bool), GsError> {
        self.send(GsMessage::LocalToHost)?;
        loop {
            match self.reply_rx.recv() {
                Ok(GsReply::HostData { quad, done }) => return Ok((quad, done)),
                Ok(GsReply::Death(msg)) => return Err(GsError::ThreadDead(msg)),
                Ok(_) => continue,
                Err(_) => return Err(GsError::ThreadDead("worker hung up".into())),
            }
        }
    }

    /// Shared scanout buffer by index.
    pub fn framebuffer(&self, index: usize) -> Arc<Mutex<Vec<u32>>> {
        self.buffers[index & 1].clone()
    }
}

impl Drop for GsHandle {
    fn drop(&mut self) {
        let _ = self.tx.send(GsMessage::Die);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_applies_writes_in_order() {
        let mut gs = GsHandle::spawn();
        // PRIM = triangle list, then three kicked vertices drawing into a
        // 64-wide PSMCT32 frame with an open scissor.
        gs.write64(0x4C, 1 << 16).unwrap(); // FRAME_1: width 64
        gs.write64(0x40, 63 | (63u64 << 48)).unwrap(); // SCISSOR_1
        gs.write64(0x18, 0).unwrap(); // XYOFFSET_1
        gs.write64(0x00, 3).unwrap(); // PRIM
        gs.write64(0x01, 0x80u64 | (0x80 << 32)).unwrap(); // RGBAQ
        gs.set_xyz(0, 0, 0, true).unwrap();
        gs.set_xyz(32 << 4, 0, 0, true).unwrap();
        gs.set_xyz(0, 32 << 4, 0, true).unwrap();

        // DISPLAY2/DISPFB2 for an 8x8 scanout window.
        gs.write64_privileged(0x00A0, (31u64 << 32) | (7u64 << 44)).unwrap();
        gs.write64_privileged(0x0090, 1 << 9).unwrap();
        let (w, h) = gs.render_crt(0).unwrap();
        assert_eq!((w, h), (8, 8));
        let buffer = gs.framebuffer(0);
        let pixel = buffer.lock().unwrap()[0];
        assert_eq!(pixel & 0x00FFFFFF, 0x000080);
    }

    #[test]
    fn death_reply_surfaces_as_error() {
        let mut gs = GsHandle::spawn();
        // 0x77 is not a drawing register; the worker dies on it.
        gs.write64(0x77, 0).unwrap();
        let err = gs.render_crt(0).unwrap_err();
        assert!(matches!(err, GsError::ThreadDead(_)));
    }
}
