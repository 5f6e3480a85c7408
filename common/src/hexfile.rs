use std::io::{self, BufRead, BufReader, Read, Write};

/// Runs shorter than this are written out byte by byte.
const MIN_RUN: u32 = 4;
const BYTES_PER_LINE: usize = 16;

#[derive(Clone, Debug, PartialEq)]
pub enum HexFileLine {
    Data(Vec<HexFileData>),
    Comment(String),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HexFileData {
    Byte(u8),
    Run(u32, u8),
}

/// Logisim "v2.0 raw" image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HexFile {
    pub lines: Vec<HexFileLine>,
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

impl HexFile {
    pub const fn header() -> &'static str {
        "v2.0 raw"
    }

    /// Encodes `bytes`, collapsing runs of identical bytes into `N*xx` blocks.
    pub fn from_bytes(comment: Option<&str>, bytes: &[u8]) -> HexFile {
        let mut lines = Vec::new();
        if let Some(comment) = comment {
            lines.push(HexFileLine::Comment(comment.to_string()));
        }

        let mut data = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            let run = bytes[i..].iter().take_while(|x| **x == b).count();
            if run as u32 >= MIN_RUN {
                data.push(HexFileData::Run(run as u32, b));
                i += run;
            } else {
                data.push(HexFileData::Byte(b));
                i += 1;
            }

            if data.len() == BYTES_PER_LINE {
                lines.push(HexFileLine::Data(std::mem::take(&mut data)));
            }
        }
        if !data.is_empty() {
            lines.push(HexFileLine::Data(data));
        }

        HexFile { lines }
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for line in &self.lines {
            match line {
                HexFileLine::Comment(_) => {},
                HexFileLine::Data(data) => {
                    for data in data {
                        match data {
                            HexFileData::Byte(b) => bytes.push(*b),
                            HexFileData::Run(count, b) => {
                                bytes.extend(std::iter::repeat(*b).take(*count as usize));
                            }
                        }
                    }
                }
            }
        }

        bytes
    }

    pub fn write<W: Write>(&self, mut w: W) -> Result<(), io::Error> {
        writeln!(w, "{}", HexFile::header())?;
        for line in &self.lines {
            match line {
                HexFileLine::Comment(c) => writeln!(w, "# {}", c)?,
                HexFileLine::Data(data) => {
                    let blocks: Vec<String> = data.iter().map(|d| match d {
                        HexFileData::Byte(b) => format!("{:02x}", b),
                        HexFileData::Run(count, b) => format!("{}*{:02x}", count, b),
                    }).collect();
                    writeln!(w, "{}", blocks.join(" "))?;
                }
            }
        }
        Ok(())
    }

    pub fn read<R: Read>(r: R) -> Result<HexFile, io::Error> {
        let file = BufReader::new(r);
        let mut lines = file.lines();

        match lines.next() {
            Some(Ok(header)) if header.trim() == HexFile::header() => {}
            Some(Ok(header)) => return Err(invalid(format!("unexpected header '{}'", header))),
            Some(Err(e)) => return Err(e),
            None => return Err(invalid("empty hex file".to_string())),
        }

        let mut parsed = Vec::new();

        for line in lines {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(comment) = line.strip_prefix('#') {
                parsed.push(HexFileLine::Comment(comment.trim().to_string()));
                continue;
            }

            let mut data = Vec::new();

            for block in line.split_whitespace() {
                let mut tokens = block.split('*');
                let first = tokens.next().unwrap_or_default();
                let second = tokens.next();

                let bad_block = |_| invalid(format!("bad block '{}'", block));
                data.push(if let Some(value) = second {
                    HexFileData::Run(
                        first.parse::<u32>().map_err(bad_block)?,
                        u8::from_str_radix(value, 16).map_err(bad_block)?)
                } else {
                    HexFileData::Byte(u8::from_str_radix(first, 16).map_err(bad_block)?)
                });
            }

            parsed.push(HexFileLine::Data(data));
        }

        Ok(HexFile {
            lines: parsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_collapse() {
        let mut bytes = vec![0x40, 0x04, 0x14];
        bytes.extend([0u8; 13]);
        let hex = HexFile::from_bytes(Some("control"), &bytes);

        let mut out = Vec::new();
        hex.write(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!("v2.0 raw\n# control\n40 04 14 13*00\n", text);
    }

    #[test]
    fn short_runs_stay_bytes() {
        let hex = HexFile::from_bytes(None, &[7, 7, 7, 1]);
        assert_eq!(
            vec![HexFileLine::Data(vec![
                HexFileData::Byte(7),
                HexFileData::Byte(7),
                HexFileData::Byte(7),
                HexFileData::Byte(1),
            ])],
            hex.lines);
    }

    #[test]
    fn read_back() {
        let bytes: Vec<u8> = (0..200u32).map(|i| if i % 50 < 30 { 0 } else { i as u8 }).collect();
        let mut out = Vec::new();
        HexFile::from_bytes(Some("sample"), &bytes).write(&mut out).unwrap();

        let parsed = HexFile::read(out.as_slice()).unwrap();
        assert_eq!(bytes, parsed.bytes());
    }

    #[test]
    fn bad_header() {
        let err = HexFile::read("v3.0 hex\n00 01\n".as_bytes()).unwrap_err();
        assert_eq!(io::ErrorKind::InvalidData, err.kind());
    }
}
