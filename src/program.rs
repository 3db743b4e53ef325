//! Binary program files.
//!
//! Layout, all words 32-bit little-endian:
//!
//! ```text
//! textsize datasize dataend
//! text[0] .. text[textsize - 1]
//! data[0] .. data[datasize - 1]
//! ```
//!
//! Loading goes through [`Machine::load`], so a file whose stack region is
//! smaller than [`crate::machine::MINSTACKSIZE`] gets its data segment grown.

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::error::LoadError;
use crate::instruction::{Instruction, Word};
use crate::machine::Machine;

const HEADER_WORDS: usize = 3;
const WORD_BYTES: usize = 4;

fn words(bytes: &[u8]) -> impl Iterator<Item = Word> + '_ {
    bytes
        .chunks_exact(WORD_BYTES)
        .map(|chunk| Word::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

/// Decode a program image.
pub fn parse_program(bytes: &[u8]) -> Result<Machine, LoadError> {
    let header_bytes = HEADER_WORDS * WORD_BYTES;
    if bytes.len() < header_bytes {
        return Err(LoadError::MissingHeader(bytes.len()));
    }
    let header: Vec<Word> = words(&bytes[..header_bytes]).collect();
    let (textsize, datasize, dataend) = (header[0], header[1], header[2]);

    let expected = (textsize as usize)
        .checked_add(datasize as usize)
        .and_then(|n| n.checked_mul(WORD_BYTES))
        .and_then(|n| n.checked_add(header_bytes))
        .ok_or(LoadError::TooLarge { textsize, datasize })?;
    if bytes.len() != expected {
        return Err(LoadError::SizeMismatch {
            expected,
            actual: bytes.len(),
        });
    }

    if dataend > datasize {
        return Err(LoadError::DataEnd { dataend, datasize });
    }

    let body = &bytes[header_bytes..];
    let (text_bytes, data_bytes) = body.split_at(textsize as usize * WORD_BYTES);
    let text = words(text_bytes).map(Instruction::from_raw).collect();
    let data = words(data_bytes).collect();
    Ok(Machine::load(text, data, dataend as usize))
}

/// Read and decode the program file at `path`.
pub fn read_program(path: &Path) -> Result<Machine, LoadError> {
    let bytes = fs::read(path)?;
    parse_program(&bytes)
}

/// Encode the machine's segments in program-file format.
pub fn write_program<W: Write>(machine: &Machine, mut out: W) -> io::Result<()> {
    let header = [
        machine.textsize() as Word,
        machine.datasize() as Word,
        machine.dataend as Word,
    ];
    let text = machine.text.iter().map(|instr| instr.raw());
    for word in header.into_iter().chain(text).chain(machine.data.iter().copied()) {
        out.write_all(&word.to_le_bytes())?;
    }
    out.flush()
}

/// Write the machine's segments to a program file at `path`.
pub fn save_program(machine: &Machine, path: &Path) -> Result<(), LoadError> {
    let file = fs::File::create(path)?;
    write_program(machine, io::BufWriter::new(file))?;
    Ok(())
}

/// Segments as hex words, four per line, ready to be pasted into source.
pub fn hex_dump(machine: &Machine) -> String {
    fn block(out: &mut String, name: &str, words: &[Word]) {
        let _ = writeln!(out, "{name} ({} words) = {{", words.len());
        for line in words.chunks(4) {
            let cells: Vec<String> = line.iter().map(|w| format!("0x{w:08x},")).collect();
            let _ = writeln!(out, "    {}", cells.join(" "));
        }
        let _ = writeln!(out, "}};");
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "textsize = {}, datasize = {}, dataend = {}",
        machine.textsize(),
        machine.datasize(),
        machine.dataend
    );
    let text: Vec<Word> = machine.text.iter().map(|instr| instr.raw()).collect();
    block(&mut out, "text", &text);
    block(&mut out, "data", &machine.data);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Opcode;
    use crate::machine::MINSTACKSIZE;
    use crate::programs;
    use crate::simul::{End, RunOptions, simul};

    fn image(header: [u32; 3], body: &[u32]) -> Vec<u8> {
        header
            .iter()
            .chain(body)
            .flat_map(|w| w.to_le_bytes())
            .collect()
    }

    #[test]
    fn test_write_then_parse_simple() {
        let original = programs::simple();
        let mut bytes = Vec::new();
        write_program(&original, &mut bytes).unwrap();
        assert_eq!(bytes.len(), 4 * (3 + 12 + 20));
        assert_eq!(&bytes[..12], &[12, 0, 0, 0, 20, 0, 0, 0, 5, 0, 0, 0]);

        let mut loaded = parse_program(&bytes).unwrap();
        assert_eq!(loaded.text, original.text);
        assert_eq!(loaded.data, original.data);
        assert_eq!(loaded.dataend, original.dataend);

        let options = RunOptions {
            trace: false,
            step_limit: Some(1000),
        };
        let outcome = simul(&mut loaded, &options, None).unwrap();
        assert_eq!(outcome.end, End::Halted { addr: 8 });
        assert_eq!(loaded.data[2], 50);
    }

    #[test]
    fn test_parse_grows_stack() {
        let halt = Instruction::generic(Opcode::Halt).raw();
        let bytes = image([1, 4, 3], &[halt, 1, 2, 3, 4]);
        let m = parse_program(&bytes).unwrap();
        assert_eq!(m.datasize(), 3 + MINSTACKSIZE);
        assert_eq!(&m.data[..4], &[1, 2, 3, 4]);
        assert_eq!(m.sp() as usize, 3 + MINSTACKSIZE - 1);
    }

    #[test]
    fn test_parse_missing_header() {
        assert!(matches!(
            parse_program(&[1, 0, 0, 0, 2]),
            Err(LoadError::MissingHeader(5))
        ));
    }

    #[test]
    fn test_parse_truncated_body() {
        let bytes = image([2, 2, 0], &[0, 0, 0]);
        assert!(matches!(
            parse_program(&bytes),
            Err(LoadError::SizeMismatch {
                expected: 28,
                actual: 24
            })
        ));
    }

    #[test]
    fn test_parse_trailing_bytes() {
        let mut bytes = image([0, 1, 0], &[7]);
        bytes.push(0);
        assert!(matches!(parse_program(&bytes), Err(LoadError::SizeMismatch { .. })));
    }

    #[test]
    fn test_parse_dataend_past_data() {
        let bytes = image([0, 2, 3], &[0, 0]);
        assert!(matches!(
            parse_program(&bytes),
            Err(LoadError::DataEnd {
                dataend: 3,
                datasize: 2
            })
        ));
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_program(Path::new("/nonexistent/minisim/prog.bin")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }

    #[test]
    fn test_save_and_read_file() {
        let path = std::env::temp_dir().join(format!("minisim-{}.prog", std::process::id()));
        let original = programs::subroutine();
        save_program(&original, &path).unwrap();
        let loaded = read_program(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded.text, original.text);
        assert_eq!(loaded.data, original.data);
    }

    #[test]
    fn test_hex_dump() {
        let dump = hex_dump(&programs::simple());
        assert!(dump.starts_with("textsize = 12, datasize = 20, dataend = 5"));
        assert!(dump.contains("text (12 words) = {"));
        assert!(dump.contains("    0x0000000a, 0x00000005, 0x00000014, 0x00000000,"));
    }
}
