use std::cmp::Ordering;

use colored::Colorize;
use miette::Result;

use crate::error;
use crate::image::Image;
use crate::term::Console;

/// LC3 can address 128KB of memory.
pub const MEMORY_MAX: usize = 0x10000;

/// Keyboard status register. Bit 15 is set while a keystroke is waiting.
pub const KBSR: u16 = 0xFE00;
/// Keyboard data register. Holds the keystroke latched by the last KBSR poll.
pub const KBDR: u16 = 0xFE02;

/// Execution begins here regardless of where the image was loaded.
const PC_START: u16 = 0x3000;

/// Represents complete machine state during runtime.
pub struct RunState {
    /// System memory - 128KB in size.
    mem: [u16; MEMORY_MAX],
    /// Program counter
    pc: u16,
    /// 8x 16-bit registers
    reg: [u16; 8],
    /// Condition code
    flag: Flag,
    /// Cleared by the HALT trap
    running: bool,
    console: Box<dyn Console>,
}

/// Set from the result of the previous register write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flag {
    N = 0b100,
    Z = 0b010,
    P = 0b001,
}

impl RunState {
    /// Create a machine with the image placed in memory and everything else
    /// zeroed. Words that would fall past the end of memory are dropped.
    pub fn new(image: &Image, console: Box<dyn Console>) -> RunState {
        let mut mem = [0; MEMORY_MAX];
        let orig = usize::from(image.origin);
        let len = image.words.len().min(MEMORY_MAX - orig);
        mem[orig..orig + len].copy_from_slice(&image.words[..len]);

        RunState {
            mem,
            pc: PC_START,
            reg: [0; 8],
            flag: Flag::Z,
            running: true,
            console,
        }
    }

    const OP_TABLE: [fn(&mut RunState, u16) -> Result<()>; 16] = [
        Self::br,   // 0x0
        Self::add,  // 0x1
        Self::ld,   // 0x2
        Self::st,   // 0x3
        Self::jsr,  // 0x4
        Self::and,  // 0x5
        Self::ldr,  // 0x6
        Self::str,  // 0x7
        Self::rti,  // 0x8
        Self::not,  // 0x9
        Self::ldi,  // 0xA
        Self::sti,  // 0xB
        Self::jmp,  // 0xC
        Self::res,  // 0xD
        Self::lea,  // 0xE
        Self::trap, // 0xF
    ];

    /// Fetch, decode and execute until halted or a fault aborts the run.
    pub fn run(&mut self) -> Result<()> {
        while self.running {
            let instr = self.mem_read(self.pc)?;
            // PC incremented before instruction is performed
            self.pc = self.pc.wrapping_add(1);
            let opcode = (instr >> 12) as usize;
            Self::OP_TABLE[opcode](self, instr)?;
        }
        Ok(())
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    pub fn flag(&self) -> Flag {
        self.flag
    }

    #[inline]
    pub fn reg(&mut self, reg: u16) -> &mut u16 {
        // SAFETY: index is masked to 0..8
        unsafe { self.reg.get_unchecked_mut((reg & 0b111) as usize) }
    }

    /// Raw cell access, without the device behavior of [`KBSR`].
    #[inline]
    pub fn mem(&mut self, addr: u16) -> &mut u16 {
        // SAFETY: memory fits any u16 index
        unsafe { self.mem.get_unchecked_mut(addr as usize) }
    }

    /// Instruction-visible memory read. Reading [`KBSR`] polls the console:
    /// an available keystroke is consumed and latched into [`KBDR`] with the
    /// status bit set, otherwise the status reads zero.
    fn mem_read(&mut self, addr: u16) -> Result<u16> {
        if addr == KBSR {
            if self.console.poll_input().map_err(error::console_failed)? {
                let byte = self.console.read_byte().map_err(error::console_failed)?;
                *self.mem(KBSR) = 1 << 15;
                *self.mem(KBDR) = byte as u16;
            } else {
                *self.mem(KBSR) = 0;
            }
        }
        Ok(*self.mem(addr))
    }

    /// Instruction-visible memory write. Stores are unconditional; the
    /// keyboard registers have no write-side device behavior.
    fn mem_write(&mut self, addr: u16, val: u16) {
        *self.mem(addr) = val;
    }

    #[inline]
    fn s_ext(val: u16, bits: u32) -> u16 {
        let val = val & (2u16.pow(bits) - 1);
        if val & 2u16.pow(bits - 1) == 0 {
            // positive
            val
        } else {
            // negative
            val | !(2u16.pow(bits) - 1)
        }
    }

    #[inline]
    fn set_flags(&mut self, val: u16) {
        self.flag = match (val as i16).cmp(&0) {
            Ordering::Less => Flag::N,
            Ordering::Equal => Flag::Z,
            Ordering::Greater => Flag::P,
        }
    }

    fn br(&mut self, instr: u16) -> Result<()> {
        let nzp = (instr >> 9) & 0b111;
        if self.flag as u16 & nzp != 0 {
            self.pc = self.pc.wrapping_add(Self::s_ext(instr, 9));
        }
        Ok(())
    }

    fn add(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let sr = (instr >> 6) & 0b111;

        let val1 = *self.reg(sr);
        // Check if imm
        let val2 = if instr & 0b100000 == 0 {
            // reg
            *self.reg(instr & 0b111)
        } else {
            // imm
            Self::s_ext(instr, 5)
        };
        let res = val1.wrapping_add(val2);
        *self.reg(dr) = res;
        self.set_flags(res);
        Ok(())
    }

    fn and(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let sr = (instr >> 6) & 0b111;

        let val1 = *self.reg(sr);
        // Check if imm
        let val2 = if instr & 0b100000 == 0 {
            // reg
            *self.reg(instr & 0b111)
        } else {
            // imm
            Self::s_ext(instr, 5)
        };
        let res = val1 & val2;
        *self.reg(dr) = res;
        self.set_flags(res);
        Ok(())
    }

    fn jmp(&mut self, instr: u16) -> Result<()> {
        let br = (instr >> 6) & 0b111;
        self.pc = *self.reg(br);
        Ok(())
    }

    fn jsr(&mut self, instr: u16) -> Result<()> {
        *self.reg(7) = self.pc;
        if instr & 0x800 == 0 {
            // reg
            let br = (instr >> 6) & 0b111;
            self.pc = *self.reg(br);
        } else {
            // offs
            self.pc = self.pc.wrapping_add(Self::s_ext(instr, 11));
        }
        Ok(())
    }

    fn ld(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let val = self.mem_read(self.pc.wrapping_add(Self::s_ext(instr, 9)))?;
        *self.reg(dr) = val;
        self.set_flags(val);
        Ok(())
    }

    fn ldi(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let ptr = self.mem_read(self.pc.wrapping_add(Self::s_ext(instr, 9)))?;
        let val = self.mem_read(ptr)?;
        *self.reg(dr) = val;
        self.set_flags(val);
        Ok(())
    }

    fn ldr(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let br = (instr >> 6) & 0b111;
        let ptr = *self.reg(br);
        let val = self.mem_read(ptr.wrapping_add(Self::s_ext(instr, 6)))?;
        *self.reg(dr) = val;
        self.set_flags(val);
        Ok(())
    }

    fn lea(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let val = self.pc.wrapping_add(Self::s_ext(instr, 9));
        *self.reg(dr) = val;
        self.set_flags(val);
        Ok(())
    }

    fn not(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let sr = (instr >> 6) & 0b111;
        let val = !*self.reg(sr);
        *self.reg(dr) = val;
        self.set_flags(val);
        Ok(())
    }

    fn st(&mut self, instr: u16) -> Result<()> {
        let sr = (instr >> 9) & 0b111;
        let val = *self.reg(sr);
        self.mem_write(self.pc.wrapping_add(Self::s_ext(instr, 9)), val);
        Ok(())
    }

    fn sti(&mut self, instr: u16) -> Result<()> {
        let sr = (instr >> 9) & 0b111;
        let val = *self.reg(sr);
        let ptr = self.mem_read(self.pc.wrapping_add(Self::s_ext(instr, 9)))?;
        self.mem_write(ptr, val);
        Ok(())
    }

    fn str(&mut self, instr: u16) -> Result<()> {
        let sr = (instr >> 9) & 0b111;
        let br = (instr >> 6) & 0b111;
        let val = *self.reg(sr);
        let ptr = *self.reg(br);
        self.mem_write(ptr.wrapping_add(Self::s_ext(instr, 6)), val);
        Ok(())
    }

    /// RTI needs the privileged state this machine does not model.
    fn rti(&mut self, instr: u16) -> Result<()> {
        Err(error::illegal_opcode(instr, self.pc.wrapping_sub(1)))
    }

    fn res(&mut self, instr: u16) -> Result<()> {
        Err(error::illegal_opcode(instr, self.pc.wrapping_sub(1)))
    }

    /// Trap routines are emulated against the console directly; nothing is
    /// fetched from a trap vector table.
    fn trap(&mut self, instr: u16) -> Result<()> {
        *self.reg(7) = self.pc;
        match instr & 0xFF {
            // getc
            0x20 => {
                let byte = self.console_read()?;
                *self.reg(0) = byte as u16;
                self.set_flags(byte as u16);
            }
            // out
            0x21 => {
                let chr = (*self.reg(0) & 0xFF) as u8;
                self.console_write(&[chr])?;
                self.console_flush()?;
            }
            // puts
            0x22 => {
                let mut addr = *self.reg(0);
                let mut chars = Vec::new();
                loop {
                    let word = *self.mem(addr);
                    if word == 0 {
                        break;
                    }
                    chars.push((word & 0xFF) as u8);
                    addr = addr.wrapping_add(1);
                }
                self.console_write(&chars)?;
                self.console_flush()?;
            }
            // in
            0x23 => {
                self.console_write(b"Enter a character: ")?;
                self.console_flush()?;
                let byte = self.console_read()?;
                self.console_write(&[byte])?;
                *self.reg(0) = byte as u16;
                self.set_flags(byte as u16);
                self.console_flush()?;
            }
            // putsp
            0x24 => {
                let mut addr = *self.reg(0);
                let mut chars = Vec::new();
                loop {
                    let word = *self.mem(addr);
                    if word == 0 {
                        break;
                    }
                    chars.push((word & 0xFF) as u8);
                    // A zero high byte is padding, not output
                    let high = (word >> 8) as u8;
                    if high != 0 {
                        chars.push(high);
                    }
                    addr = addr.wrapping_add(1);
                }
                self.console_write(&chars)?;
                self.console_flush()?;
            }
            // halt
            0x25 => {
                let notice = format!("\r\n{:>12}\r\n", "Halted".cyan());
                self.console_write(notice.as_bytes())?;
                self.console_flush()?;
                self.running = false;
            }
            // unknown
            vect => return Err(error::unknown_trap(vect, self.pc.wrapping_sub(1))),
        }
        Ok(())
    }

    fn console_read(&mut self) -> Result<u8> {
        self.console.read_byte().map_err(error::console_failed)
    }

    fn console_write(&mut self, bytes: &[u8]) -> Result<()> {
        self.console.write_bytes(bytes).map_err(error::console_failed)
    }

    fn console_flush(&mut self) -> Result<()> {
        self.console.flush().map_err(error::console_failed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::term::PipeConsole;

    /// Machine with `words` loaded at 0x3000, driven by a pipe console.
    fn boot(words: &[u16]) -> (RunState, Arc<PipeConsole>) {
        let pipe = Arc::new(PipeConsole::default());
        let image = Image {
            origin: 0x3000,
            words: words.to_vec(),
        };
        let state = RunState::new(&image, Box::new(Arc::clone(&pipe)));
        (state, pipe)
    }

    #[test]
    fn sign_extends_negative_immediates() {
        assert_eq!(RunState::s_ext(0x1F, 5), 0xFFFF);
        assert_eq!(RunState::s_ext(0x10, 5), 0xFFF0);
        assert_eq!(RunState::s_ext(0x3F, 6), 0xFFFF);
        assert_eq!(RunState::s_ext(0x100, 9), 0xFF00);
        assert_eq!(RunState::s_ext(0x7FF, 11), 0xFFFF);
    }

    #[test]
    fn sign_extends_positive_immediates_unchanged() {
        assert_eq!(RunState::s_ext(0x0F, 5), 0x000F);
        assert_eq!(RunState::s_ext(0x0FF, 9), 0x00FF);
        assert_eq!(RunState::s_ext(0x3FF, 11), 0x03FF);
    }

    #[test]
    fn sign_extension_is_idempotent() {
        for bits in [5u32, 6, 9, 11] {
            for val in [0u16, 1, 0x1F, 0x2A5, 0x7FF, 0xFFFF] {
                let once = RunState::s_ext(val, bits);
                assert_eq!(RunState::s_ext(once, bits), once);
            }
        }
    }

    #[test]
    fn boots_with_zero_flag_and_default_pc() {
        let (mut state, _) = boot(&[]);
        assert_eq!(state.pc(), 0x3000);
        assert_eq!(state.flag(), Flag::Z);
        assert_eq!(*state.reg(7), 0);
    }

    #[test]
    fn unwritten_memory_reads_zero() {
        let (mut state, _) = boot(&[]);
        assert_eq!(state.mem_read(0x1234).unwrap(), 0);
        assert_eq!(*state.mem(0xABCD), 0);
    }

    #[test]
    fn adds_immediate_and_halts() {
        // AND R0,R0,#0 ; ADD R0,R0,#5 ; HALT
        let (mut state, _) = boot(&[0x5020, 0x1025, 0xF025]);
        state.run().unwrap();
        assert_eq!(*state.reg(0), 5);
        assert_eq!(state.flag(), Flag::P);
    }

    #[test]
    fn add_wraps_to_negative() {
        // AND R0,R0,#0 ; ADD R0,R0,#-1 ; HALT
        let (mut state, _) = boot(&[0x5020, 0x103F, 0xF025]);
        state.run().unwrap();
        assert_eq!(*state.reg(0), 0xFFFF);
        assert_eq!(state.flag(), Flag::N);
    }

    #[test]
    fn and_immediate_zero_clears() {
        let (mut state, _) = boot(&[0x5020, 0xF025]);
        *state.reg(0) = 0xBEEF;
        state.run().unwrap();
        assert_eq!(*state.reg(0), 0);
        assert_eq!(state.flag(), Flag::Z);
    }

    #[test]
    fn register_operand_forms() {
        // AND R0,R0,#0 ; ADD R0,R0,#5 ; ADD R1,R0,R0 ; AND R2,R0,R0 ; HALT
        let (mut state, _) = boot(&[0x5020, 0x1025, 0x1200, 0x5400, 0xF025]);
        state.run().unwrap();
        assert_eq!(*state.reg(1), 10);
        assert_eq!(*state.reg(2), 5);
    }

    #[test]
    fn not_of_zero_is_all_ones() {
        // AND R0,R0,#0 ; NOT R0,R0 ; HALT
        let (mut state, _) = boot(&[0x5020, 0x903F, 0xF025]);
        state.run().unwrap();
        assert_eq!(*state.reg(0), 0xFFFF);
        assert_eq!(state.flag(), Flag::N);
    }

    #[test]
    fn lea_is_relative_to_incremented_pc() {
        // LEA R0,#2 ; HALT
        let (mut state, _) = boot(&[0xE002, 0xF025]);
        state.run().unwrap();
        assert_eq!(*state.reg(0), 0x3003);
        assert_eq!(state.flag(), Flag::P);
    }

    #[test]
    fn lea_wraps_around_address_space() {
        let (mut state, _) = boot(&[]);
        *state.mem(0xFFFF) = 0xE1FF; // LEA R0,#-1
        *state.mem(0x0000) = 0xF025; // HALT
        state.set_pc(0xFFFF);
        state.run().unwrap();
        // PC wrapped to 0x0000 before the offset was applied
        assert_eq!(*state.reg(0), 0xFFFF);
        assert_eq!(state.flag(), Flag::N);
    }

    #[test]
    fn ld_reads_pc_relative() {
        // LD R0,#2 ; HALT ; -- ; data
        let (mut state, _) = boot(&[0x2002, 0xF025, 0x0000, 0x00AB]);
        state.run().unwrap();
        assert_eq!(*state.reg(0), 0x00AB);
        assert_eq!(state.flag(), Flag::P);
    }

    #[test]
    fn ldi_dereferences_twice() {
        // LDI R1,#2 ; HALT ; -- ; pointer ; data
        let (mut state, _) = boot(&[0xA202, 0xF025, 0x0000, 0x3004, 0x00AB]);
        state.run().unwrap();
        assert_eq!(*state.reg(1), 0x00AB);
        assert_eq!(state.flag(), Flag::P);
    }

    #[test]
    fn str_then_ldr_round_trips_through_base() {
        // AND R0,R0,#0 ; ADD R0,R0,#9 ; STR R0,R1,#1 ; LDR R2,R1,#1 ; HALT
        let (mut state, _) = boot(&[0x5020, 0x1029, 0x7041, 0x6441, 0xF025]);
        *state.reg(1) = 0x4000;
        state.run().unwrap();
        assert_eq!(*state.mem(0x4001), 9);
        assert_eq!(*state.reg(2), 9);
        assert_eq!(state.flag(), Flag::P);
    }

    #[test]
    fn st_writes_pc_relative() {
        // AND R0,R0,#0 ; ADD R0,R0,#7 ; ST R0,#2 ; HALT
        let (mut state, _) = boot(&[0x5020, 0x1027, 0x3002, 0xF025]);
        state.run().unwrap();
        assert_eq!(*state.mem(0x3005), 7);
    }

    #[test]
    fn sti_writes_through_pointer() {
        // AND R0,R0,#0 ; ADD R0,R0,#5 ; STI R0,#1 ; HALT ; pointer
        let (mut state, _) = boot(&[0x5020, 0x1025, 0xB001, 0xF025, 0x4000]);
        state.run().unwrap();
        assert_eq!(*state.mem(0x4000), 5);
    }

    #[test]
    fn taken_branch_skips_words() {
        // AND R0,R0,#0 ; BRz #2 ; RTI ; RES ; HALT
        // Success proves the two illegal words never executed.
        let (mut state, _) = boot(&[0x5020, 0x0402, 0x8000, 0xD000, 0xF025]);
        state.run().unwrap();
        assert_eq!(*state.reg(0), 0);
    }

    #[test]
    fn untaken_branch_falls_through() {
        // AND R0,R0,#0 ; BRn #1 ; ADD R0,R0,#1 ; HALT
        let (mut state, _) = boot(&[0x5020, 0x0801, 0x1021, 0xF025]);
        state.run().unwrap();
        assert_eq!(*state.reg(0), 1);
    }

    #[test]
    fn jmp_loads_pc_from_base() {
        // JMP R3 ; RES x4 ; HALT
        let (mut state, _) = boot(&[0xC0C0, 0xD000, 0xD000, 0xD000, 0xD000, 0xF025]);
        *state.reg(3) = 0x3005;
        state.run().unwrap();
        assert_eq!(state.pc(), 0x3006);
    }

    #[test]
    fn jsr_saves_following_address() {
        // JSR #1 ; RES ; HALT
        let (mut state, _) = boot(&[0x4801, 0xD000, 0xF025]);
        state.run().unwrap();
        assert_eq!(*state.reg(7), 0x3001);
        assert_eq!(state.pc(), 0x3003);
    }

    #[test]
    fn jsrr_jumps_through_base() {
        // JSRR R2 ; RES ; HALT
        let (mut state, _) = boot(&[0x4080, 0xD000, 0xF025]);
        *state.reg(2) = 0x3002;
        state.run().unwrap();
        assert_eq!(*state.reg(7), 0x3001);
    }

    #[test]
    fn rti_aborts_the_run() {
        let (mut state, _) = boot(&[0x8000]);
        let err = state.run().unwrap_err();
        assert!(err.to_string().contains("Illegal instruction"));
        assert!(err.to_string().contains("0x3000"));
    }

    #[test]
    fn reserved_opcode_aborts_the_run() {
        let (mut state, _) = boot(&[0xD000]);
        let err = state.run().unwrap_err();
        assert!(err.to_string().contains("Illegal instruction"));
    }

    #[test]
    fn unknown_trap_vector_aborts_the_run() {
        let (mut state, _) = boot(&[0xF030]);
        let err = state.run().unwrap_err();
        assert!(err.to_string().contains("0x30"));
    }

    #[test]
    fn getc_stores_byte_and_flags() {
        let (mut state, pipe) = boot(&[0xF020, 0xF025]);
        pipe.feed_input(b"A");
        state.run().unwrap();
        assert_eq!(*state.reg(0), 0x41);
        assert_eq!(state.flag(), Flag::P);
        // Return address of the GETC trap
        assert_eq!(*state.reg(7), 0x3001);
    }

    #[test]
    fn getc_with_no_input_is_fatal() {
        let (mut state, _) = boot(&[0xF020]);
        let err = state.run().unwrap_err();
        assert!(err.to_string().contains("Console I/O failed"));
    }

    #[test]
    fn out_emits_low_byte_only() {
        let (mut state, pipe) = boot(&[0xF021, 0xF025]);
        *state.reg(0) = 0x4142;
        state.run().unwrap();
        assert_eq!(pipe.take_output()[0], 0x42);
    }

    #[test]
    fn puts_emits_word_string() {
        // LEA R0,#2 ; PUTS ; HALT ; "HI"
        let (mut state, pipe) = boot(&[0xE002, 0xF022, 0xF025, 0x0048, 0x0049, 0x0000]);
        state.run().unwrap();
        let output = pipe.take_output();
        assert!(output.starts_with(b"HI"));
        assert!(String::from_utf8_lossy(&output).contains("Halted"));
    }

    #[test]
    fn putsp_unpacks_byte_pairs() {
        // LEA R0,#2 ; PUTSP ; HALT ; "AB" packed, then "C" with pad byte
        let (mut state, pipe) = boot(&[0xE002, 0xF024, 0xF025, 0x4241, 0x0043, 0x0000]);
        state.run().unwrap();
        assert!(pipe.take_output().starts_with(b"ABC"));
    }

    #[test]
    fn in_prompts_and_echoes() {
        let (mut state, pipe) = boot(&[0xF023, 0xF025]);
        pipe.feed_input(b"q");
        state.run().unwrap();
        let output = String::from_utf8_lossy(&pipe.take_output()).into_owned();
        assert!(output.starts_with("Enter a character: q"));
        assert_eq!(*state.reg(0), u16::from(b'q'));
        assert_eq!(state.flag(), Flag::P);
    }

    #[test]
    fn kbsr_read_latches_one_keystroke() {
        let (mut state, pipe) = boot(&[]);
        pipe.feed_input(b"ab");

        assert_eq!(state.mem_read(KBSR).unwrap(), 0x8000);
        assert_eq!(*state.mem(KBDR), u16::from(b'a'));
        assert_eq!(pipe.remaining_input(), 1);

        // Each status read consumes at most one more byte
        assert_eq!(state.mem_read(KBSR).unwrap(), 0x8000);
        assert_eq!(*state.mem(KBDR), u16::from(b'b'));
        assert_eq!(pipe.remaining_input(), 0);

        assert_eq!(state.mem_read(KBSR).unwrap(), 0);
    }

    #[test]
    fn kbsr_reads_zero_while_no_input_waiting() {
        // LDI R1,KBSR ; BRn #1 ; HALT ; RES
        // With nothing to read the status register is zero and execution
        // continues straight to HALT instead of waiting for a keystroke.
        let (mut state, pipe) = boot(&[0xA203, 0x0801, 0xF025, 0xD000, KBSR]);
        state.run().unwrap();
        assert_eq!(*state.reg(1), 0);
        assert_eq!(state.flag(), Flag::Z);
        assert_eq!(pipe.remaining_input(), 0);
    }

    #[test]
    fn kbdr_read_has_no_side_effects() {
        let (mut state, pipe) = boot(&[]);
        pipe.feed_input(b"z");
        assert_eq!(state.mem_read(KBDR).unwrap(), 0);
        assert_eq!(pipe.remaining_input(), 1);
    }

    #[test]
    fn program_polls_keyboard_until_keystroke() {
        // LDI R1,KBSR ; BRzp #-2 ; LDI R2,KBDR ; ADD R0,R2,#0 ; OUT ; HALT
        // followed by the device register addresses
        let words = [
            0xA205, 0x07FE, 0xA404, 0x10A0, 0xF021, 0xF025, KBSR, KBDR,
        ];
        let (mut state, pipe) = boot(&words);
        pipe.feed_input(b"x");
        state.run().unwrap();
        assert_eq!(*state.reg(0), u16::from(b'x'));
        assert!(pipe.take_output().starts_with(b"x"));
        assert_eq!(pipe.remaining_input(), 0);
    }

    #[test]
    fn image_words_land_at_origin() {
        let pipe = Arc::new(PipeConsole::default());
        let image = Image {
            origin: 0x4000,
            words: vec![0xF025, 0x1234],
        };
        let mut state = RunState::new(&image, Box::new(Arc::clone(&pipe)));
        assert_eq!(*state.mem(0x4000), 0xF025);
        assert_eq!(*state.mem(0x4001), 0x1234);
        assert_eq!(state.pc(), 0x3000);
    }
}
