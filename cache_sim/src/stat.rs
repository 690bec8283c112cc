use std::{fmt, io};

pub trait Stat {
    fn view(&self) -> Box<dyn StatView + '_>;
    fn to_json(&self) -> serde_json::Result<serde_json::Value>;
}

pub trait StatView: fmt::Display {
    /// header of stat
    fn header(&self) -> &str;
    /// body width
    fn width(&self) -> usize;
}

pub trait AddStats {
    /// add stat to `buf`.
    fn add_stats(&self, buf: &mut Stats);
}

/// stats in the order they were added
#[derive(Default)]
pub struct Stats {
    stats: Vec<Box<dyn Stat>>,
}

impl IntoIterator for Stats {
    type Item = Box<dyn Stat>;

    type IntoIter = <Vec<Box<dyn Stat>> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.stats.into_iter()
    }
}

impl Extend<Box<dyn Stat>> for Stats {
    fn extend<T: IntoIterator<Item = Box<dyn Stat>>>(&mut self, iter: T) {
        self.stats.extend(iter)
    }
}

impl Stats {
    pub fn push(&mut self, stat: Box<dyn Stat>) {
        self.stats.push(stat)
    }
    pub fn len(&self) -> usize {
        self.stats.len()
    }
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
    pub fn view(&self) -> StatAllView<'_> {
        StatAllView {
            views: self.stats.iter().map(|s| s.view()).collect(),
        }
    }
    /// human-readable report, one block per stat
    pub fn print_stats(&self, sink: &mut dyn io::Write) -> io::Result<()> {
        writeln!(sink, "{}", self.view())
    }
    /// the same report as a JSON array
    pub fn write_json(&self, sink: &mut dyn io::Write) -> serde_json::Result<()> {
        let values = self
            .stats
            .iter()
            .map(|s| s.to_json())
            .collect::<serde_json::Result<Vec<_>>>()?;
        serde_json::to_writer_pretty(sink, &values)
    }
}

pub struct StatAllView<'s> {
    views: Vec<Box<dyn StatView + 's>>,
}

const BANNER: &str = " statistics ";

impl fmt::Display for StatAllView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .views
            .iter()
            .map(|s| s.header().len().max(s.width()))
            .max()
            .unwrap_or(0)
            .max(BANNER.len());
        writeln!(f, "{BANNER:-^width$}")?;
        for sv in &self.views {
            writeln!(f, "{}:", sv.header())?;
            write!(f, "{}", sv)?;
        }
        write!(f, "{:-<width$}", "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(&'static str);

    impl Stat for Dummy {
        fn view(&self) -> Box<dyn StatView + '_> {
            Box::new(self)
        }
        fn to_json(&self) -> serde_json::Result<serde_json::Value> {
            serde_json::to_value(self.0)
        }
    }

    impl StatView for &'_ Dummy {
        fn header(&self) -> &str {
            self.0
        }
        fn width(&self) -> usize {
            16
        }
    }

    impl fmt::Display for &'_ Dummy {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            writeln!(f, "  n: {:>11}", self.0.len())
        }
    }

    #[test]
    fn test_empty_report() {
        let mut out = Vec::new();
        Stats::default().print_stats(&mut out).unwrap();
        assert_eq!(
            " statistics \n------------\n",
            String::from_utf8(out).unwrap()
        );
    }
    #[test]
    fn test_report_order() {
        let mut ss = Stats::default();
        ss.push(Box::new(Dummy("first")));
        ss.extend([Box::new(Dummy("second")) as Box<dyn Stat>]);
        assert_eq!(2, ss.len());
        let s = format!("{}", ss.view());
        let lines: Vec<_> = s.lines().collect();
        assert_eq!("-- statistics --", lines[0]);
        assert_eq!(
            ["first:", "  n:           5", "second:", "  n:           6"],
            lines[1..5]
        );
        assert_eq!("-".repeat(16), lines[5]);

        let mut json = Vec::new();
        ss.write_json(&mut json).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(serde_json::json!(["first", "second"]), v);
    }
}
