// SPDX-License-Identifier: MPL-2.0

//! Commands and requests handed to the DMA core.

use alloc::vec::Vec;

use crate::{
    dma::DmaMode,
    io::DescTableRef,
    prelude::*,
    regs::{CommandFlags, TransferMode, make_command, make_xfer_command},
};

/// Response types of SD/SDIO/eMMC commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    None,
    R1,
    R1b,
    R2,
    R3,
    R4,
    R5,
    R5b,
    R6,
    R7,
}

impl ResponseType {
    /// Returns the response-type select and check bits of the Command
    /// register.
    pub fn command_flags(self) -> CommandFlags {
        match self {
            ResponseType::None => CommandFlags::empty(),
            ResponseType::R2 => CommandFlags::RESP_LONG | CommandFlags::CRC_CHECK,
            ResponseType::R3 | ResponseType::R4 => CommandFlags::RESP_SHORT,
            ResponseType::R1b | ResponseType::R5b => {
                CommandFlags::RESP_SHORT_BUSY | CommandFlags::CRC_CHECK | CommandFlags::INDEX_CHECK
            }
            ResponseType::R1 | ResponseType::R5 | ResponseType::R6 | ResponseType::R7 => {
                CommandFlags::RESP_SHORT | CommandFlags::CRC_CHECK | CommandFlags::INDEX_CHECK
            }
        }
    }

    /// Whether the card signals busy on DAT0 after the response.
    pub fn is_busy(self) -> bool {
        matches!(self, ResponseType::R1b | ResponseType::R5b)
    }

    /// Returns the Transfer Mode bits for hardware response checking, if
    /// the controller can check this response type.
    fn check_mode(self) -> Option<TransferMode> {
        match self {
            ResponseType::R1 | ResponseType::R1b => Some(TransferMode::RESP_ERR_CHECK),
            ResponseType::R5 | ResponseType::R5b => {
                Some(TransferMode::RESP_ERR_CHECK | TransferMode::RESP_R5)
            }
            _ => None,
        }
    }
}

/// Direction of the data phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDirection {
    Read,
    Write,
}

/// Automatic stop/count command issued by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoCmd {
    #[default]
    None,
    Cmd12,
    Cmd23,
}

/// One hardware-addressable fragment of a data buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubBuffer {
    /// Device address of the first byte.
    pub daddr: u64,
    /// Length in bytes.
    pub len: u32,
}

impl SubBuffer {
    pub const fn new(daddr: u64, len: u32) -> Self {
        Self { daddr, len }
    }
}

/// The data phase of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandData {
    pub dir: DataDirection,
    pub block_count: u32,
    pub block_len: u32,
    /// Device address of the logical data buffer.
    pub daddr: u64,
    /// Fragments supplied by the caller. When absent, the buffer at `daddr`
    /// is split by the DMA core.
    pub sub_buffers: Option<Vec<SubBuffer>>,
}

impl CommandData {
    pub fn new(dir: DataDirection, block_count: u32, block_len: u32, daddr: u64) -> Self {
        Self {
            dir,
            block_count,
            block_len,
            daddr,
            sub_buffers: None,
        }
    }

    /// Attaches a caller-supplied fragment list.
    pub fn with_sub_buffers(mut self, sub_buffers: Vec<SubBuffer>) -> Self {
        self.sub_buffers = Some(sub_buffers);
        self
    }

    /// Returns the total transfer size in bytes.
    pub fn size(&self) -> u64 {
        u64::from(self.block_count) * u64::from(self.block_len)
    }
}

/// Transfer parameters of one SD/MMC command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub index: u8,
    pub argument: u32,
    pub response: ResponseType,
    /// Let the controller check R1/R5 response error bits.
    pub response_check: bool,
    pub auto_cmd: AutoCmd,
    /// Open-ended transfer without a known block count.
    pub infinite: bool,
    pub data: Option<CommandData>,
}

impl Command {
    /// Creates a command without a data phase.
    pub fn new(index: u8, argument: u32, response: ResponseType) -> Self {
        Self {
            index,
            argument,
            response,
            response_check: false,
            auto_cmd: AutoCmd::None,
            infinite: false,
            data: None,
        }
    }

    pub fn with_data(mut self, data: CommandData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_auto_cmd(mut self, auto_cmd: AutoCmd) -> Self {
        self.auto_cmd = auto_cmd;
        self
    }

    pub fn with_response_check(mut self) -> Self {
        self.response_check = true;
        self
    }

    pub fn infinite(mut self) -> Self {
        self.infinite = true;
        self
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Returns the Command register value.
    pub fn command_reg(&self) -> u16 {
        let mut flags = self.response.command_flags();
        if self.has_data() {
            flags |= CommandFlags::DATA_PRESENT;
        }
        make_command(self.index, flags)
    }

    /// Returns the Transfer Mode register value.
    pub fn transfer_mode(&self, dma: bool) -> TransferMode {
        let mut mode = TransferMode::empty();
        if self.response_check
            && let Some(check) = self.response.check_mode()
        {
            mode |= check;
        }
        let Some(data) = &self.data else {
            return mode;
        };

        mode.set(TransferMode::DMA, dma);
        mode.set(TransferMode::READ, data.dir == DataDirection::Read);
        if data.block_count > 1 || self.infinite {
            mode |= TransferMode::MULTI_BLOCK;
            if !self.infinite {
                mode |= TransferMode::BLOCK_COUNT;
            }
            match self.auto_cmd {
                AutoCmd::None => {}
                AutoCmd::Cmd12 => mode |= TransferMode::AUTO_CMD12,
                AutoCmd::Cmd23 => mode |= TransferMode::AUTO_CMD23,
            }
        }
        mode
    }

    /// Returns the combined Transfer Mode and Command register value.
    pub fn xfer_command(&self, dma: bool) -> u32 {
        make_xfer_command(self.command_reg(), self.transfer_mode(dma))
    }
}

/// Identity of a request, used as the slot's current-request token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTag(pub u32);

/// Lifecycle of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Preparing,
    /// Descriptors written, address programmed, engine selected.
    Armed,
    Running,
    /// SDMA boundary reached, the host is re-arming the engine.
    Resuming,
    Completed,
    Errored,
}

impl TransferState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferState::Completed | TransferState::Errored)
    }
}

/// One command, or a batch of linked commands for ADMA3.
#[derive(Debug)]
pub struct Request {
    tag: RequestTag,
    commands: Vec<Command>,
    state: TransferState,
    error: Option<Error>,
    mode: DmaMode,
    /// Device address the SDMA engine resumes from.
    resume_cursor: Option<u64>,
    desc_table: Option<DescTableRef>,
    integrated_table: Option<DescTableRef>,
}

impl Request {
    pub fn new(tag: RequestTag, commands: Vec<Command>) -> Self {
        Self {
            tag,
            commands,
            state: TransferState::Idle,
            error: None,
            mode: DmaMode::None,
            resume_cursor: None,
            desc_table: None,
            integrated_table: None,
        }
    }

    pub fn single(tag: RequestTag, command: Command) -> Self {
        Self::new(tag, alloc::vec![command])
    }

    pub fn tag(&self) -> RequestTag {
        self.tag
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Returns the command whose parameters pick the DMA mode.
    pub fn lead(&self) -> Option<&Command> {
        self.commands.first()
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Returns the DMA mode the request was prepared with.
    pub fn mode(&self) -> DmaMode {
        self.mode
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Returns the running status code, `0` while no error was recorded.
    pub fn status_code(&self) -> i32 {
        self.error.as_ref().map_or(0, |e| e.errno().code())
    }

    pub fn resume_cursor(&self) -> Option<u64> {
        self.resume_cursor
    }

    /// Returns the ADMA1/ADMA2 descriptor table, or the ADMA3 command
    /// descriptor chains.
    pub fn desc_table(&self) -> Option<DescTableRef> {
        self.desc_table
    }

    /// Returns the ADMA3 integrated descriptor table.
    pub fn integrated_table(&self) -> Option<DescTableRef> {
        self.integrated_table
    }

    pub(crate) fn set_state(&mut self, state: TransferState) {
        self.state = state;
    }

    pub(crate) fn set_mode(&mut self, mode: DmaMode) {
        self.mode = mode;
    }

    pub(crate) fn set_resume_cursor(&mut self, daddr: u64) {
        self.resume_cursor = Some(daddr);
    }

    pub(crate) fn set_tables(
        &mut self,
        desc_table: Option<DescTableRef>,
        integrated_table: Option<DescTableRef>,
    ) {
        self.desc_table = desc_table;
        self.integrated_table = integrated_table;
    }

    pub(crate) fn release_desc_table(&mut self) {
        self.desc_table = None;
    }

    /// Records `error` and moves to `Errored`.
    pub(crate) fn fail(&mut self, error: Error) -> Error {
        self.state = TransferState::Errored;
        self.error = Some(error.clone());
        error
    }

    /// Clears the outcome of a previous run so the request can be prepared
    /// again.
    pub(crate) fn reset(&mut self) {
        self.state = TransferState::Preparing;
        self.error = None;
        self.mode = DmaMode::None;
        self.resume_cursor = None;
        self.desc_table = None;
        self.integrated_table = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn read_multiple_block_register_values() {
        let cmd = Command::new(18, 0x1000, ResponseType::R1)
            .with_response_check()
            .with_auto_cmd(AutoCmd::Cmd12)
            .with_data(CommandData::new(DataDirection::Read, 8, 512, 0x8000_0000));
        assert_eq!(cmd.command_reg(), 0x123A);
        assert_eq!(cmd.transfer_mode(true).bits(), 0x00B7);
        assert_eq!(cmd.xfer_command(true), 0x123A_00B7);
    }

    #[test]
    fn single_block_write_without_dma() {
        let cmd = Command::new(24, 0, ResponseType::R1)
            .with_auto_cmd(AutoCmd::Cmd12)
            .with_data(CommandData::new(DataDirection::Write, 1, 512, 0x1000));
        assert_eq!(cmd.command_reg(), 0x183A);
        assert_eq!(cmd.transfer_mode(false), TransferMode::empty());
    }

    #[test]
    fn command_without_data() {
        let cmd = Command::new(7, 0x1234_0000, ResponseType::R1b);
        assert_eq!(cmd.command_reg(), 0x071B);
        assert!(cmd.response.is_busy());
        assert_eq!(cmd.transfer_mode(true), TransferMode::empty());

        let cmd = Command::new(52, 0, ResponseType::R5).with_response_check();
        assert_eq!(
            cmd.transfer_mode(true),
            TransferMode::RESP_ERR_CHECK | TransferMode::RESP_R5
        );
    }

    #[test]
    fn request_status_tracking() {
        let mut req = Request::single(RequestTag(3), Command::new(0, 0, ResponseType::None));
        assert_eq!(req.state(), TransferState::Idle);
        assert_eq!(req.status_code(), 0);

        let err = req.fail(Error::new(Timeout));
        assert_eq!(err.errno(), Timeout);
        assert_eq!(req.state(), TransferState::Errored);
        assert_eq!(req.status_code(), Timeout.code());
        assert!(req.state().is_terminal());

        req.reset();
        assert_eq!(req.state(), TransferState::Preparing);
        assert_eq!(req.status_code(), 0);
    }
}
