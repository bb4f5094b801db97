use super::*;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, ErrorKind};

/// Sequential decoder over a method's code array
pub struct BytecodeReader<'a> {
    code: &'a [u8],
    cursor: Cursor<&'a [u8]>,
}

impl<'a> BytecodeReader<'a> {
    pub fn new(code: &'a [u8]) -> BytecodeReader<'a> {
        BytecodeReader {
            code,
            cursor: Cursor::new(code),
        }
    }

    /// Address of the next instruction to be decoded
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Decode the next instruction, returning its address along with it
    pub fn next_instruction(&mut self) -> Result<Option<(usize, Instruction)>, Error> {
        let address = self.position();
        if address >= self.code.len() {
            return Ok(None);
        }
        let instruction = self.decode_at(address)?;
        Ok(Some((address, instruction)))
    }

    fn decode_at(&mut self, address: usize) -> Result<Instruction, Error> {
        use Instruction::*;

        let opcode = self.read_u8(address)?;
        let instruction = match opcode {
            0x00 => Nop,
            0x01 => AConstNull,
            0x02 => IConstM1,
            0x03 => IConst0,
            0x04 => IConst1,
            0x05 => IConst2,
            0x06 => IConst3,
            0x07 => IConst4,
            0x08 => IConst5,
            0x09 => LConst0,
            0x0a => LConst1,
            0x0b => FConst0,
            0x0c => FConst1,
            0x0d => FConst2,
            0x0e => DConst0,
            0x0f => DConst1,
            0x10 => BiPush(self.read_i8(address)?),
            0x11 => SiPush(self.read_i16(address)?),
            0x12 => Ldc(self.read_u8(address)? as u16),
            0x13 => Ldc(self.read_u16(address)?),
            0x14 => Ldc2(self.read_u16(address)?),
            0x15 => ILoad(self.read_u8(address)? as u16),
            0x16 => LLoad(self.read_u8(address)? as u16),
            0x17 => FLoad(self.read_u8(address)? as u16),
            0x18 => DLoad(self.read_u8(address)? as u16),
            0x19 => ALoad(self.read_u8(address)? as u16),
            0x1a..=0x1d => ILoad((opcode - 0x1a) as u16),
            0x1e..=0x21 => LLoad((opcode - 0x1e) as u16),
            0x22..=0x25 => FLoad((opcode - 0x22) as u16),
            0x26..=0x29 => DLoad((opcode - 0x26) as u16),
            0x2a..=0x2d => ALoad((opcode - 0x2a) as u16),
            0x2e => IALoad,
            0x2f => LALoad,
            0x30 => FALoad,
            0x31 => DALoad,
            0x32 => AALoad,
            0x33 => BALoad,
            0x34 => CALoad,
            0x35 => SALoad,
            0x36 => IStore(self.read_u8(address)? as u16),
            0x37 => LStore(self.read_u8(address)? as u16),
            0x38 => FStore(self.read_u8(address)? as u16),
            0x39 => DStore(self.read_u8(address)? as u16),
            0x3a => AStore(self.read_u8(address)? as u16),
            0x3b..=0x3e => IStore((opcode - 0x3b) as u16),
            0x3f..=0x42 => LStore((opcode - 0x3f) as u16),
            0x43..=0x46 => FStore((opcode - 0x43) as u16),
            0x47..=0x4a => DStore((opcode - 0x47) as u16),
            0x4b..=0x4e => AStore((opcode - 0x4b) as u16),
            0x4f => IAStore,
            0x50 => LAStore,
            0x51 => FAStore,
            0x52 => DAStore,
            0x53 => AAStore,
            0x54 => BAStore,
            0x55 => CAStore,
            0x56 => SAStore,
            0x57 => Pop,
            0x58 => Pop2,
            0x59 => Dup,
            0x5a => DupX1,
            0x5b => DupX2,
            0x5c => Dup2,
            0x5d => Dup2X1,
            0x5e => Dup2X2,
            0x5f => Swap,
            0x60 => IAdd,
            0x61 => LAdd,
            0x62 => FAdd,
            0x63 => DAdd,
            0x64 => ISub,
            0x65 => LSub,
            0x66 => FSub,
            0x67 => DSub,
            0x68 => IMul,
            0x69 => LMul,
            0x6a => FMul,
            0x6b => DMul,
            0x6c => IDiv,
            0x6d => LDiv,
            0x6e => FDiv,
            0x6f => DDiv,
            0x70 => IRem,
            0x71 => LRem,
            0x72 => FRem,
            0x73 => DRem,
            0x74 => INeg,
            0x75 => LNeg,
            0x76 => FNeg,
            0x77 => DNeg,
            0x78 => ISh(ShiftType::Left),
            0x79 => LSh(ShiftType::Left),
            0x7a => ISh(ShiftType::ArithmeticRight),
            0x7b => LSh(ShiftType::ArithmeticRight),
            0x7c => ISh(ShiftType::LogicalRight),
            0x7d => LSh(ShiftType::LogicalRight),
            0x7e => IAnd,
            0x7f => LAnd,
            0x80 => IOr,
            0x81 => LOr,
            0x82 => IXor,
            0x83 => LXor,
            0x84 => {
                let index = self.read_u8(address)? as u16;
                let by = self.read_i8(address)? as i16;
                IInc(index, by)
            }
            0x85 => I2L,
            0x86 => I2F,
            0x87 => I2D,
            0x88 => L2I,
            0x89 => L2F,
            0x8a => L2D,
            0x8b => F2I,
            0x8c => F2L,
            0x8d => F2D,
            0x8e => D2I,
            0x8f => D2L,
            0x90 => D2F,
            0x91 => I2B,
            0x92 => I2C,
            0x93 => I2S,
            0x94 => LCmp,
            0x95 => FCmp(CompareMode::L),
            0x96 => FCmp(CompareMode::G),
            0x97 => DCmp(CompareMode::L),
            0x98 => DCmp(CompareMode::G),
            0x99..=0x9e => {
                let target = self.read_short_target(address)?;
                If(Self::ord_comparison(opcode - 0x99), target)
            }
            0x9f..=0xa4 => {
                let target = self.read_short_target(address)?;
                IfICmp(Self::ord_comparison(opcode - 0x9f), target)
            }
            0xa5 => IfACmp(EqComparison::EQ, self.read_short_target(address)?),
            0xa6 => IfACmp(EqComparison::NE, self.read_short_target(address)?),
            0xa7 => Goto(self.read_short_target(address)?),
            0xa8 => Jsr(self.read_short_target(address)?),
            0xa9 => Ret(self.read_u8(address)? as u16),
            0xaa => {
                self.skip_switch_padding(address)?;
                let default = self.read_wide_target(address)?;
                let low = self.read_i32(address)?;
                let high = self.read_i32(address)?;
                let count = (high as i64 - low as i64 + 1).max(0);
                let mut targets = vec![];
                for _ in 0..count {
                    targets.push(self.read_wide_target(address)?);
                }
                TableSwitch {
                    default,
                    low,
                    targets,
                }
            }
            0xab => {
                self.skip_switch_padding(address)?;
                let default = self.read_wide_target(address)?;
                let pairs = self.read_i32(address)?.max(0);
                let mut targets = vec![];
                for _ in 0..pairs {
                    let key = self.read_i32(address)?;
                    targets.push((key, self.read_wide_target(address)?));
                }
                LookupSwitch { default, targets }
            }
            0xac => IReturn,
            0xad => LReturn,
            0xae => FReturn,
            0xaf => DReturn,
            0xb0 => AReturn,
            0xb1 => Return,
            0xb2 => GetStatic(self.read_u16(address)?),
            0xb3 => PutStatic(self.read_u16(address)?),
            0xb4 => GetField(self.read_u16(address)?),
            0xb5 => PutField(self.read_u16(address)?),
            0xb6 => Invoke(InvokeType::Virtual, self.read_u16(address)?),
            0xb7 => Invoke(InvokeType::Special, self.read_u16(address)?),
            0xb8 => Invoke(InvokeType::Static, self.read_u16(address)?),
            0xb9 => {
                let method = self.read_u16(address)?;
                let count = self.read_u8(address)?;
                let _zero = self.read_u8(address)?;
                Invoke(InvokeType::Interface(count), method)
            }
            0xba => {
                let method = self.read_u16(address)?;
                let _zeros = self.read_u16(address)?;
                InvokeDynamic(method)
            }
            0xbb => New(self.read_u16(address)?),
            0xbc => NewArray(self.read_u8(address)?),
            0xbd => ANewArray(self.read_u16(address)?),
            0xbe => ArrayLength,
            0xbf => AThrow,
            0xc0 => CheckCast(self.read_u16(address)?),
            0xc1 => InstanceOf(self.read_u16(address)?),
            0xc2 => MonitorEnter,
            0xc3 => MonitorExit,
            0xc4 => self.decode_wide(address)?,
            0xc5 => {
                let class = self.read_u16(address)?;
                let dimensions = self.read_u8(address)?;
                MultiANewArray(class, dimensions)
            }
            0xc6 => IfNull(EqComparison::EQ, self.read_short_target(address)?),
            0xc7 => IfNull(EqComparison::NE, self.read_short_target(address)?),
            0xc8 => Goto(self.read_wide_target(address)?),
            0xc9 => Jsr(self.read_wide_target(address)?),
            _ => return Err(Error::UnknownOpcode { address, opcode }),
        };
        Ok(instruction)
    }

    /// Instruction following a `wide` prefix
    fn decode_wide(&mut self, address: usize) -> Result<Instruction, Error> {
        use Instruction::*;

        let opcode = self.read_u8(address)?;
        let instruction = match opcode {
            0x15 => ILoad(self.read_u16(address)?),
            0x16 => LLoad(self.read_u16(address)?),
            0x17 => FLoad(self.read_u16(address)?),
            0x18 => DLoad(self.read_u16(address)?),
            0x19 => ALoad(self.read_u16(address)?),
            0x36 => IStore(self.read_u16(address)?),
            0x37 => LStore(self.read_u16(address)?),
            0x38 => FStore(self.read_u16(address)?),
            0x39 => DStore(self.read_u16(address)?),
            0x3a => AStore(self.read_u16(address)?),
            0xa9 => Ret(self.read_u16(address)?),
            0x84 => {
                let index = self.read_u16(address)?;
                IInc(index, self.read_i16(address)?)
            }
            _ => return Err(Error::InvalidWide { address, opcode }),
        };
        Ok(instruction)
    }

    /// Order matches the opcode order of the `if<cond>` and `if_icmp<cond>` families
    fn ord_comparison(offset: u8) -> OrdComparison {
        match offset {
            0 => OrdComparison::EQ,
            1 => OrdComparison::NE,
            2 => OrdComparison::LT,
            3 => OrdComparison::GE,
            4 => OrdComparison::GT,
            _ => OrdComparison::LE,
        }
    }

    /// Switch operands are 4-byte aligned relative to the start of the code
    fn skip_switch_padding(&mut self, address: usize) -> Result<(), Error> {
        while self.position() % 4 != 0 {
            self.read_u8(address)?;
        }
        Ok(())
    }

    fn read_short_target(&mut self, address: usize) -> Result<usize, Error> {
        let offset = self.read_i16(address)?;
        self.branch_target(address, offset as isize)
    }

    fn read_wide_target(&mut self, address: usize) -> Result<usize, Error> {
        let offset = self.read_i32(address)?;
        self.branch_target(address, offset as isize)
    }

    fn branch_target(&self, address: usize, offset: isize) -> Result<usize, Error> {
        let target = address as isize + offset;
        if target < 0 || target as usize >= self.code.len() {
            Err(Error::InvalidBranchTarget { address, target })
        } else {
            Ok(target as usize)
        }
    }

    fn read_u8(&mut self, address: usize) -> Result<u8, Error> {
        self.cursor
            .read_u8()
            .map_err(|err| Self::read_error(err, address))
    }

    fn read_i8(&mut self, address: usize) -> Result<i8, Error> {
        self.cursor
            .read_i8()
            .map_err(|err| Self::read_error(err, address))
    }

    fn read_u16(&mut self, address: usize) -> Result<u16, Error> {
        self.cursor
            .read_u16::<BigEndian>()
            .map_err(|err| Self::read_error(err, address))
    }

    fn read_i16(&mut self, address: usize) -> Result<i16, Error> {
        self.cursor
            .read_i16::<BigEndian>()
            .map_err(|err| Self::read_error(err, address))
    }

    fn read_i32(&mut self, address: usize) -> Result<i32, Error> {
        self.cursor
            .read_i32::<BigEndian>()
            .map_err(|err| Self::read_error(err, address))
    }

    fn read_error(err: std::io::Error, address: usize) -> Error {
        if err.kind() == ErrorKind::UnexpectedEof {
            Error::Truncated { address }
        } else {
            Error::IoError(err)
        }
    }
}

/// Decode a full code array
///
/// Every branch target must land on the start of an instruction.
pub fn decode(code: &[u8]) -> Result<Vec<(usize, Instruction)>, Error> {
    let mut reader = BytecodeReader::new(code);
    let mut instructions = vec![];
    while let Some(decoded) = reader.next_instruction()? {
        instructions.push(decoded);
    }

    for (address, instruction) in &instructions {
        if let ControlFlow::Branch { targets, .. } = instruction.control_flow() {
            for target in targets {
                let on_boundary = instructions
                    .binary_search_by_key(&target, |(addr, _)| *addr)
                    .is_ok();
                if !on_boundary {
                    return Err(Error::InvalidBranchTarget {
                        address: *address,
                        target: target as isize,
                    });
                }
            }
        }
    }

    Ok(instructions)
}

/// Callbacks invoked on each instruction of a method, in program order
pub trait BytecodeVisitor {
    type Error: From<Error>;

    /// Called once before any instruction
    fn start_method(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called before `visit`, with the address of the instruction about to be visited
    fn start_instruction(&mut self, _address: usize) -> Result<(), Self::Error> {
        Ok(())
    }

    fn visit(&mut self, address: usize, instruction: &Instruction) -> Result<(), Self::Error>;

    /// Called once after the last instruction
    fn end_method(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Decode the code array and drive the visitor over it
pub fn parse<V: BytecodeVisitor>(code: &[u8], visitor: &mut V) -> Result<(), V::Error> {
    let instructions = decode(code)?;
    visitor.start_method()?;
    for (address, instruction) in &instructions {
        visitor.start_instruction(*address)?;
        visitor.visit(*address, instruction)?;
    }
    visitor.end_method()
}

#[cfg(test)]
mod test {
    use super::*;

    fn decoded(code: &[u8]) -> Vec<(usize, Instruction)> {
        match decode(code) {
            Ok(instructions) => instructions,
            Err(err) => panic!("failed to decode {:?}: {:?}", code, err),
        }
    }

    #[test]
    fn simple_arithmetic() {
        let code = [0x04, 0x05, 0x60, 0xac];
        assert_eq!(
            decoded(&code),
            vec![
                (0, Instruction::IConst1),
                (1, Instruction::IConst2),
                (2, Instruction::IAdd),
                (3, Instruction::IReturn),
            ]
        );
    }

    #[test]
    fn branch_offsets_are_absolute() {
        // 0: iload_0; 1: ifeq +6 (=7); 4: goto -4 (=0); 7: return
        let code = [0x1a, 0x99, 0x00, 0x06, 0xa7, 0xff, 0xfc, 0xb1];
        assert_eq!(
            decoded(&code),
            vec![
                (0, Instruction::ILoad(0)),
                (1, Instruction::If(OrdComparison::EQ, 7)),
                (4, Instruction::Goto(0)),
                (7, Instruction::Return),
            ]
        );
    }

    #[test]
    fn wide_and_iinc() {
        let code = [0xc4, 0x84, 0x01, 0x00, 0xff, 0xfe, 0x84, 0x02, 0x7f, 0xb1];
        assert_eq!(
            decoded(&code),
            vec![
                (0, Instruction::IInc(256, -2)),
                (6, Instruction::IInc(2, 127)),
                (9, Instruction::Return),
            ]
        );
    }

    #[test]
    fn tableswitch_padding() {
        // 0: iload_0; 1: tableswitch (2 pad bytes) default=+23 low=0 high=1 [+23, +23]; 24: return
        let mut code = vec![0x1a, 0xaa, 0x00, 0x00];
        code.extend_from_slice(&23i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&1i32.to_be_bytes());
        code.extend_from_slice(&23i32.to_be_bytes());
        code.extend_from_slice(&23i32.to_be_bytes());
        code.push(0xb1);
        assert_eq!(code.len(), 25);
        assert_eq!(
            decoded(&code),
            vec![
                (0, Instruction::ILoad(0)),
                (
                    1,
                    Instruction::TableSwitch {
                        default: 24,
                        low: 0,
                        targets: vec![24, 24]
                    }
                ),
                (24, Instruction::Return),
            ]
        );
    }

    #[test]
    fn truncated_code() {
        match decode(&[0x04, 0x11, 0x00]) {
            Err(Error::Truncated { address: 1 }) => (),
            other => panic!("expected truncation at 1, got {:?}", other),
        }
    }

    #[test]
    fn unknown_opcode() {
        match decode(&[0xca]) {
            Err(Error::UnknownOpcode {
                address: 0,
                opcode: 0xca,
            }) => (),
            other => panic!("expected unknown opcode, got {:?}", other),
        }
    }

    #[test]
    fn branch_into_middle_of_instruction() {
        // 0: bipush 1; 2: goto -1 (=1, inside bipush)
        match decode(&[0x10, 0x01, 0xa7, 0xff, 0xff]) {
            Err(Error::InvalidBranchTarget {
                address: 2,
                target: 1,
            }) => (),
            other => panic!("expected invalid target, got {:?}", other),
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl BytecodeVisitor for Recorder {
        type Error = Error;

        fn start_method(&mut self) -> Result<(), Error> {
            self.events.push("start".to_string());
            Ok(())
        }

        fn start_instruction(&mut self, address: usize) -> Result<(), Error> {
            self.events.push(format!("@{}", address));
            Ok(())
        }

        fn visit(&mut self, _address: usize, instruction: &Instruction) -> Result<(), Error> {
            self.events.push(format!("{:?}", instruction));
            Ok(())
        }

        fn end_method(&mut self) -> Result<(), Error> {
            self.events.push("end".to_string());
            Ok(())
        }
    }

    #[test]
    fn visitor_callbacks_in_order() {
        let mut recorder = Recorder::default();
        parse(&[0x03, 0xac], &mut recorder).expect("valid code");
        assert_eq!(
            recorder.events,
            vec!["start", "@0", "IConst0", "@1", "IReturn", "end"]
        );
    }
}
