//! This file implements the bootloader's command framing, on top of any
//! [`ByteLink`].
//!
//! Every command is a single byte.  Uploads follow the command byte with the
//! payload length, as a big-endian 16 bit value, and then the payload itself.
//! Nothing is acknowledged at this level - a byte either goes through the
//! link handshake or the transfer fails.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use std::fmt;

use crate::constants::MAX_UPLOAD_SIZE;
use crate::protocol::{ByteLink, LinkError};

/// Commands the bootloader accepts.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Nop = 0x00,
    RebootRam = 0x01,
    RebootRom = 0x02,
    UploadMain = 0x03,
    UploadSub = 0x04,
}

impl Command {
    /// The command byte.
    pub const fn byte(self) -> u8 {
        self as u8
    }
}

// Implements try_from to create a Command from a received command byte.
impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Nop),
            0x01 => Ok(Self::RebootRam),
            0x02 => Ok(Self::RebootRom),
            0x03 => Ok(Self::UploadMain),
            0x04 => Ok(Self::UploadSub),
            other => Err(other),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Nop => write!(f, "Nop"),
            Command::RebootRam => write!(f, "RebootRam"),
            Command::RebootRom => write!(f, "RebootRom"),
            Command::UploadMain => write!(f, "UploadMain"),
            Command::UploadSub => write!(f, "UploadSub"),
        }
    }
}

/// Which of the target's CPUs an image is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The main CPU's RAM.
    Main,
    /// The sub CPU's RAM.
    Sub,
}

impl Target {
    /// The upload command for this target.
    pub const fn command(self) -> Command {
        match self {
            Target::Main => Command::UploadMain,
            Target::Sub => Command::UploadSub,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Main => write!(f, "main"),
            Target::Sub => write!(f, "sub"),
        }
    }
}

/// The steps of the boot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStage {
    /// Checking the bootloader is idle, with a NOP.
    Initialize,
    /// Uploading an image.
    Upload(Target),
    /// Rebooting into the uploaded image.
    Reboot,
    /// Reading console output after the reboot.
    Console,
}

impl fmt::Display for BootStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootStage::Initialize => write!(f, "Initialize"),
            BootStage::Upload(target) => write!(f, "Upload to {} ram", target),
            BootStage::Reboot => write!(f, "Reboot"),
            BootStage::Console => write!(f, "Read"),
        }
    }
}

/// A boot sequence failure, with the stage it happened in.
#[derive(Debug, thiserror::Error)]
#[error("{}", describe(.stage, .source))]
pub struct BootError {
    pub stage: BootStage,
    pub source: LinkError,
}

impl BootError {
    fn new(stage: BootStage) -> impl FnOnce(LinkError) -> Self {
        move |source| Self { stage, source }
    }
}

fn describe(stage: &BootStage, source: &LinkError) -> String {
    match (stage, source.is_timeout()) {
        (BootStage::Initialize, true) => {
            "Bootloader device not in default state. Operation timed out.".to_string()
        }
        (BootStage::Initialize, false) => {
            format!("Bootloader device not in default state: {source}")
        }
        (BootStage::Console, true) => "Read timed out. Shouldn't happen.".to_string(),
        (stage, true) => format!("{stage} timed out."),
        (stage, false) => format!("{stage} failed: {source}"),
    }
}

/// The bootloader, as seen from the host.
pub struct Bootloader<L> {
    link: L,
}

impl<L: ByteLink> Bootloader<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    /// Access the underlying link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Mutable access to the underlying link.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Retrieve the underlying link.
    pub fn into_inner(self) -> L {
        self.link
    }

    /// Send a bare command byte.
    pub fn command(&mut self, command: Command) -> Result<(), LinkError> {
        debug!("Sending command {}", command);
        self.link.send_byte(command.byte())
    }

    /// Does nothing, but a bootloader that takes it is in its default state.
    pub fn nop(&mut self) -> Result<(), LinkError> {
        self.command(Command::Nop)
    }

    /// Start the uploaded image.
    pub fn reboot_ram(&mut self) -> Result<(), LinkError> {
        self.command(Command::RebootRam)
    }

    /// Reboot into the ROM.
    pub fn reboot_rom(&mut self) -> Result<(), LinkError> {
        self.command(Command::RebootRom)
    }

    /// Upload `data` to the target's RAM.
    ///
    /// Payloads over [`MAX_UPLOAD_SIZE`] are rejected before anything is
    /// sent.  Otherwise fails on the first byte that fails, having sent
    /// everything before it.
    pub fn upload(&mut self, target: Target, data: &[u8]) -> Result<(), LinkError> {
        let len = u16::try_from(data.len())
            .ok()
            .filter(|&len| usize::from(len) <= MAX_UPLOAD_SIZE)
            .ok_or(LinkError::PayloadTooLarge {
                len: data.len(),
                max: MAX_UPLOAD_SIZE,
            })?;

        info!("Uploading to {} ram ({} bytes)", target, len);
        self.command(target.command())?;
        self.send_word(len)?;

        for (ii, &byte) in data.iter().enumerate() {
            if let Err(e) = self.link.send_byte(byte) {
                debug!("Upload failed at byte {} of {}", ii, len);
                return Err(e);
            }
        }

        debug!("Upload to {} ram complete", target);
        Ok(())
    }

    /// Receive a byte of the target's output.
    pub fn recv(&mut self) -> Result<u8, LinkError> {
        self.link.recv_byte()
    }

    /// Iterate over the target's output.  Ends after the first error, which
    /// is yielded.
    pub fn console(&mut self) -> Console<'_, L> {
        Console {
            boot: self,
            done: false,
        }
    }

    /// Run the boot sequence: check the bootloader is idle, upload the
    /// image(s) and reboot into them.
    pub fn boot(&mut self, main: &[u8], sub: Option<&[u8]>) -> Result<(), BootError> {
        info!("Initializing");
        self.nop().map_err(BootError::new(BootStage::Initialize))?;

        self.upload(Target::Main, main)
            .map_err(BootError::new(BootStage::Upload(Target::Main)))?;

        if let Some(sub) = sub {
            self.upload(Target::Sub, sub)
                .map_err(BootError::new(BootStage::Upload(Target::Sub)))?;
        }

        info!("Rebooting to ram");
        self.reboot_ram().map_err(BootError::new(BootStage::Reboot))?;

        Ok(())
    }

    // Write a 16 bit value, high byte first.
    fn send_word(&mut self, word: u16) -> Result<(), LinkError> {
        let [high, low] = word.to_be_bytes();
        self.link.send_byte(high)?;
        self.link.send_byte(low)
    }
}

/// Iterator over console output.  See [`Bootloader::console`].
pub struct Console<'a, L> {
    boot: &'a mut Bootloader<L>,
    done: bool,
}

impl<L: ByteLink> Iterator for Console<'_, L> {
    type Item = Result<u8, BootError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.boot.recv().map_err(BootError::new(BootStage::Console));
        self.done = result.is_err();
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::WaitStage;
    use std::collections::VecDeque;
    use std::time::Duration;

    // Records what is sent, and fails once `fail_after` bytes have gone.
    #[derive(Default)]
    struct Recorder {
        sent: Vec<u8>,
        incoming: VecDeque<u8>,
        fail_after: Option<usize>,
    }

    fn timeout() -> LinkError {
        LinkError::Timeout {
            stage: WaitStage::DeviceReady,
            waited: Duration::from_millis(10),
        }
    }

    impl ByteLink for Recorder {
        fn send_byte(&mut self, byte: u8) -> Result<(), LinkError> {
            if self.fail_after.is_some_and(|n| self.sent.len() >= n) {
                return Err(timeout());
            }
            self.sent.push(byte);
            Ok(())
        }

        fn recv_byte(&mut self) -> Result<u8, LinkError> {
            self.incoming.pop_front().ok_or_else(|| LinkError::Timeout {
                stage: WaitStage::NibbleReady,
                waited: Duration::from_millis(10),
            })
        }
    }

    #[test]
    fn command_bytes() {
        assert_eq!(Command::Nop.byte(), 0);
        assert_eq!(Command::RebootRam.byte(), 1);
        assert_eq!(Command::RebootRom.byte(), 2);
        assert_eq!(Command::UploadMain.byte(), 3);
        assert_eq!(Command::UploadSub.byte(), 4);
        assert_eq!(Command::try_from(4), Ok(Command::UploadSub));
        assert_eq!(Command::try_from(5), Err(5));
    }

    #[test]
    fn upload_is_command_length_payload() {
        let mut boot = Bootloader::new(Recorder::default());
        let data: Vec<u8> = (0..=u8::MAX).collect();
        boot.upload(Target::Main, &data).unwrap();

        let sent = &boot.link().sent;
        assert_eq!(&sent[..3], &[0x03, 0x01, 0x00]);
        assert_eq!(&sent[3..], data.as_slice());
    }

    #[test]
    fn empty_upload_sends_zero_length() {
        let mut boot = Bootloader::new(Recorder::default());
        boot.upload(Target::Sub, &[]).unwrap();
        assert_eq!(boot.into_inner().sent, vec![0x04, 0x00, 0x00]);
    }

    #[test]
    fn largest_upload_is_accepted() {
        let mut boot = Bootloader::new(Recorder::default());
        let data = vec![0xEA; MAX_UPLOAD_SIZE];
        boot.upload(Target::Main, &data).unwrap();
        assert_eq!(&boot.link().sent[..3], &[0x03, 0x80, 0x00]);
        assert_eq!(boot.link().sent.len(), MAX_UPLOAD_SIZE + 3);
    }

    #[test]
    fn oversize_upload_sends_nothing() {
        let mut boot = Bootloader::new(Recorder::default());
        let data = vec![0; MAX_UPLOAD_SIZE + 1];
        let err = boot.upload(Target::Main, &data).unwrap_err();
        assert!(err.is_precondition());
        assert!(boot.link().sent.is_empty());
    }

    #[test]
    fn upload_stops_at_first_failure() {
        let mut boot = Bootloader::new(Recorder {
            fail_after: Some(10),
            ..Default::default()
        });
        let err = boot.upload(Target::Main, &[0x55; 100]).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(boot.link().sent.len(), 10);
    }

    #[test]
    fn boot_sequence_order() {
        let mut boot = Bootloader::new(Recorder::default());
        boot.boot(&[0xAA], Some(&[0xBB, 0xCC])).unwrap();
        assert_eq!(
            boot.link().sent,
            vec![0x00, 0x03, 0x00, 0x01, 0xAA, 0x04, 0x00, 0x02, 0xBB, 0xCC, 0x01]
        );
    }

    #[test]
    fn boot_without_sub_image() {
        let mut boot = Bootloader::new(Recorder::default());
        boot.boot(&[0xAA], None).unwrap();
        assert_eq!(boot.link().sent, vec![0x00, 0x03, 0x00, 0x01, 0xAA, 0x01]);
    }

    #[test]
    fn boot_reports_failing_stage() {
        let mut boot = Bootloader::new(Recorder {
            fail_after: Some(0),
            ..Default::default()
        });
        let err = boot.boot(&[1, 2, 3], None).unwrap_err();
        assert_eq!(err.stage, BootStage::Initialize);
        assert_eq!(
            err.to_string(),
            "Bootloader device not in default state. Operation timed out."
        );

        let mut boot = Bootloader::new(Recorder {
            fail_after: Some(3),
            ..Default::default()
        });
        let err = boot.boot(&[1, 2, 3], None).unwrap_err();
        assert_eq!(err.stage, BootStage::Upload(Target::Main));
        assert_eq!(err.to_string(), "Upload to main ram timed out.");
    }

    #[test]
    fn console_yields_until_error() {
        let mut boot = Bootloader::new(Recorder {
            incoming: VecDeque::from(b"hi".to_vec()),
            ..Default::default()
        });

        let mut console = boot.console();
        assert_eq!(console.next().unwrap().unwrap(), b'h');
        assert_eq!(console.next().unwrap().unwrap(), b'i');
        let err = console.next().unwrap().unwrap_err();
        assert_eq!(err.stage, BootStage::Console);
        assert_eq!(err.to_string(), "Read timed out. Shouldn't happen.");
        assert!(console.next().is_none());
    }
}
