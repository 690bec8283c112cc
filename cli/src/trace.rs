use std::io::BufRead;

use anyhow::{anyhow, Context, Result};
use cache_sim::memory::{AccessKind, Addr, MemTraceEvent};

/// one committed access read from the trace
#[derive(Debug, PartialEq, Eq)]
pub struct TraceRecord {
    pub hart: usize,
    pub event: MemTraceEvent,
}

peg::parser!(grammar trace() for str {
    rule dec() -> u64
        = n:$(quiet!{['0'..='9']+}) {? n.parse().map_err(|_| "64-bit decimal") }
        / expected!("decimal")
    rule hex() -> u64
        = quiet!{"0" ['x' | 'X']} n:$(quiet!{['0'..='9' | 'a'..='f' | 'A'..='F']+})
        {? u64::from_str_radix(n, 16).map_err(|_| "64-bit hex") }
    rule number() -> u64
        = hex() / dec()
    rule kind() -> AccessKind
        = ("fetch" / "F") { AccessKind::Fetch }
        / ("load" / "L") { AccessKind::Load }
        / ("store" / "S") { AccessKind::Store }
        / expected!("fetch, load or store")
    rule record() -> TraceRecord
        = hart:(h:dec() __ { h as usize })? kind:kind() __ addr:number() __ size:dec()
        {
            TraceRecord {
                hart: hart.unwrap_or(0),
                event: MemTraceEvent::new(Addr::new(addr), size, kind),
            }
        }
    rule comment() = "#" [_]*
    pub(crate) rule line() -> Option<TraceRecord>
        = _ r:record()? _ comment()? ![_] { r }

    rule ws() = quiet!{[' ' | '\t' | '\r' | '\n']}
        / expected!("whitespace")
    rule _() = ws()*
    rule __() = ws()+
});

pub fn parse_line(line: &str) -> Result<Option<TraceRecord>> {
    trace::line(line).map_err(|e| anyhow!("expected {} at column {}", e.expected, e.location.column))
}

/// Reads records one line at a time, skipping blanks and comments.
pub struct TraceReader<R> {
    inner: R,
    line_no: usize,
    buf: String,
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line_no: 0,
            buf: String::new(),
        }
    }
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<TraceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.inner.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => self.line_no += 1,
                Err(e) => return Some(Err(e.into())),
            }
            let line_no = self.line_no;
            match parse_line(&self.buf).with_context(|| format!("trace line {line_no}")) {
                Ok(Some(r)) => return Some(Ok(r)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert_eq!(
            Some(TraceRecord {
                hart: 0,
                event: MemTraceEvent::load(0x1000, 4)
            }),
            parse_line("load 0x1000 4").unwrap()
        );
        assert_eq!(
            Some(TraceRecord {
                hart: 2,
                event: MemTraceEvent::store(4096, 8)
            }),
            parse_line("  2 S 4096 8   # spill\n").unwrap()
        );
        assert_eq!(
            Some(MemTraceEvent::fetch(0x80000000, 4)),
            parse_line("F 0x80000000 4").unwrap().map(|r| r.event)
        );
        assert_eq!(None, parse_line("").unwrap());
        assert_eq!(None, parse_line("# only a comment").unwrap());
        assert_eq!(None, parse_line("   \r\n").unwrap());
    }
    #[test]
    fn test_reject_line() {
        for l in ["load 0x1000", "jump 0 4", "load 0xg 4", "load 16 4 extra", "-1 load 0 4"] {
            assert!(parse_line(l).is_err(), "line: {l:?}");
        }
    }
    #[test]
    fn test_reader_reports_line_number() {
        let input = "# header\nF 0 4\n\nL 0x40 8\nbogus\n";
        let mut r = TraceReader::new(input.as_bytes());
        assert_eq!(MemTraceEvent::fetch(0, 4), r.next().unwrap().unwrap().event);
        assert_eq!(MemTraceEvent::load(0x40, 8), r.next().unwrap().unwrap().event);
        let e = r.next().unwrap().unwrap_err();
        assert_eq!("trace line 5", e.to_string());
        assert_eq!(5, r.line_no());
        assert!(r.next().is_none());
    }
}
