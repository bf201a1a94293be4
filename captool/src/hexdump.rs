const WIDTH: usize = 0x10;

/// One hexdump line: offset, bytes, printable text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Line<'a> {
    offset: usize,
    data: &'a [u8],
}

pub fn printable(chr: u8) -> Option<char> {
    if (0x20..0x7f).contains(&chr) {
        Some(chr as char)
    } else {
        None
    }
}

impl std::fmt::Display for Line<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:04x}", self.offset)?;

        for i in 0..WIDTH {
            if i % 8 == 0 {
                write!(f, " ")?;
            }
            match self.data.get(i) {
                Some(b) => write!(f, " {:02x}", b)?,
                None => write!(f, "   ")?,
            }
        }

        write!(f, "  |")?;
        for b in self.data {
            write!(f, "{}", printable(*b).unwrap_or('.'))?;
        }
        write!(f, "|")
    }
}

pub fn hexdump_iter(data: &[u8]) -> impl Iterator<Item = Line<'_>> {
    data.chunks(WIDTH)
        .enumerate()
        .map(|(i, data)| Line {
            offset: i * WIDTH,
            data,
        })
}
