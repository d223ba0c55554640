use std::io::{self, BufReader, Read};
use std::iter;

// Read words from a stream, assuming space + tab + CR + LF to be word boundaries
pub(crate) fn read_words<R: Read>(
    input: R,
    to_lower: bool,
) -> impl Iterator<Item = io::Result<String>> {
    let mut bytes = BufReader::new(input).bytes();
    iter::from_fn(move || -> Option<io::Result<String>> {
        let mut word = Vec::<u8>::new();
        for b in bytes.by_ref() {
            let ch = match b {
                Ok(ch) => ch,
                Err(err) => return Some(Err(err)),
            };
            if matches!(ch, b' ' | b'\t' | b'\r' | b'\n') {
                if word.is_empty() {
                    continue;
                }
                break;
            }
            word.push(ch);
        }
        if word.is_empty() {
            return None;
        }
        let word = String::from_utf8_lossy(&word);
        Some(Ok(if to_lower {
            word.to_lowercase()
        } else {
            word.into_owned()
        }))
    })
}
