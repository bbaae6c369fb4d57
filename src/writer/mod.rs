//! Writing TDF files
//!
//! `TdfWriter` emits the header, the timeline list and the node kinds the
//! reader understands. Values are sanitized so the output stays well formed
//! XML, and the `append_*` helpers build the value strings data and event
//! nodes carry.

use std::io::Write;

use chrono::Local;
use log::debug;
use quick_xml::escape::escape;

use crate::error::Result;
use crate::reader::FOOTER;

/// Filler kept in the header so an index can be written in place later
const PADDING: &str = "____________________________________________________________________________________________________";

/// Comparison operators stripped from numeric text
const COMPARISONS: [&str; 6] = ["=>", "=<", ">=", "<=", ">", "<"];

/// Strip comparison operators, signs and spaces from a data value list
#[must_use]
pub fn sanitize_data_value(text: &str) -> String {
    let mut clean = strip_comparisons(text);
    clean.retain(|c| !matches!(c, '+' | '-' | ' '));
    clean
}

/// Strip angle brackets from an attribute value
#[must_use]
pub fn sanitize_attribute(text: &str) -> String {
    text.replace(['<', '>'], "")
}

/// Strip angle brackets and equals signs from text bodies
#[must_use]
pub fn sanitize_text(text: &str) -> String {
    text.replace(['<', '>', '='], "")
}

fn strip_comparisons(text: &str) -> String {
    COMPARISONS
        .iter()
        .fold(text.to_string(), |acc, op| acc.replace(op, ""))
}

/// Append `name=value,` to a data value list
///
/// Returns `false`, leaving `total` unchanged, for an empty name or a value
/// that is empty or not numeric once comparison operators are removed.
pub fn append_name_value(total: &mut String, name: &str, value: &str) -> bool {
    let value = strip_comparisons(value);
    let value = value.trim();
    if name.is_empty() || value.is_empty() || value.parse::<f64>().is_err() {
        debug!("Discarding value '{value}' for '{name}'");
        return false;
    }
    total.push_str(name);
    total.push('=');
    total.push_str(value);
    total.push(',');
    true
}

/// Append `drug:dose:route:dosesPerDay,` to a medication list
///
/// The route defaults to `o` and the doses per day to `0`. Returns `false`
/// for an empty drug name or a non-numeric dose or doses-per-day.
pub fn append_med_info(
    total: &mut String,
    drug: &str,
    dose: &str,
    route: &str,
    doses_per_day: &str,
) -> bool {
    let route = if route.is_empty() { "o" } else { route };
    let doses_per_day = if doses_per_day.is_empty() { "0" } else { doses_per_day };
    if drug.is_empty()
        || dose.trim().parse::<f64>().is_err()
        || doses_per_day.trim().parse::<f64>().is_err()
    {
        debug!("Discarding medication '{drug}' with dose '{dose}' x {doses_per_day}");
        return false;
    }
    total.push_str(&format!("{drug}:{dose}:{route}:{doses_per_day},"));
    true
}

/// Append `subtype:cpt,` to a procedure list
pub fn append_proc_info(total: &mut String, subtype: &str, cpt: &str) -> bool {
    if subtype.is_empty() {
        return false;
    }
    total.push_str(&format!("{subtype}:{cpt},"));
    true
}

/// Streaming TDF writer
#[derive(Debug)]
pub struct TdfWriter<W: Write> {
    out: W,
    timelines: usize,
}

impl<W: Write> TdfWriter<W> {
    #[must_use]
    pub const fn new(out: W) -> Self {
        Self { out, timelines: 0 }
    }

    /// Number of timelines finished so far
    #[must_use]
    pub const fn timelines(&self) -> usize {
        self.timelines
    }

    /// Write everything up to and including the `<TimelineList>` tag
    pub fn write_header(&mut self, description: &str, source: &str, properties: &str) -> Result<()> {
        let created = Local::now().format("%b-%d-%Y %H:%M");
        write!(
            self.out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <TDF version=\"0.1\" xmlns=\"http://www.dawsondean.com/ns/TDF/\">\n\
             \n\
             <Head>\n\
             \x20   <Vocabulary>Medicine</Vocabulary>\n\
             \x20   <VocabularyDefinition></VocabularyDefinition>\n\
             \x20   <Description>{}</Description>\n\
             \x20   <DataSource>{}</DataSource>\n\
             \x20   <Created>{created}</Created>\n\
             \x20   <TLLocationIndex></TLLocationIndex>\n\
             \x20   <Properties>{}</Properties>\n\
             \x20   <Padding>{PADDING}</Padding>\n\
             </Head>\n\
             \n\
             <TimelineList>\n",
            escape(description),
            escape(source),
            escape(properties),
        )?;
        Ok(())
    }

    /// Close the timeline list and the document
    pub fn write_footer(&mut self) -> Result<()> {
        write!(self.out, "\n{FOOTER}")?;
        self.out.flush()?;
        Ok(())
    }

    /// Open a `<TL>` element; empty gender and race are omitted
    pub fn start_timeline(&mut self, id: &str, gender: &str, race: &str) -> Result<()> {
        write!(self.out, "\n<TL id=\"{}\"", escape(&sanitize_attribute(id)))?;
        if !gender.is_empty() {
            write!(self.out, " gender=\"{}\"", escape(&sanitize_attribute(gender)))?;
        }
        if !race.is_empty() {
            write!(self.out, " race=\"{}\"", escape(&sanitize_attribute(race)))?;
        }
        writeln!(self.out, ">")?;
        Ok(())
    }

    pub fn finish_timeline(&mut self) -> Result<()> {
        writeln!(self.out, "</TL>")?;
        self.timelines += 1;
        Ok(())
    }

    /// Admission-scope outcome flags; empty flags are omitted
    pub fn write_outcomes(&mut self, died: &str, died_in_12_months: &str, readmit_30_days: &str) -> Result<()> {
        let body = [
            ("DiedThisAdmission", died),
            ("DiedIn12Mos", died_in_12_months),
            ("Readmit30D", readmit_30_days),
        ]
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| format!("{name}={}", sanitize_text(value)))
        .collect::<Vec<_>>()
        .join(";");
        writeln!(self.out, "    <OC scope=\"Admit\">{body}</OC>")?;
        Ok(())
    }

    /// A `<D>` node; `values` is a `name=value,...` list
    pub fn write_data_node(&mut self, class: &str, timestamp: &str, options: &str, values: &str) -> Result<()> {
        write!(self.out, "    <D C=\"{}\" T=\"{}\"", escape(class), escape(timestamp))?;
        let options: String = options.chars().filter(|c| *c != ' ').collect();
        if !options.is_empty() {
            write!(self.out, " O=\"{}\"", escape(&sanitize_attribute(&options)))?;
        }
        writeln!(self.out, ">{}</D>", escape(&sanitize_data_value(values)))?;
        Ok(())
    }

    /// An `<E>` node; empty optional attributes are omitted
    pub fn write_event_node(
        &mut self,
        class: &str,
        timestamp: &str,
        calendar_time: &str,
        stop_time: &str,
        value: &str,
        detail: &str,
    ) -> Result<()> {
        write!(self.out, "    <E C=\"{}\" T=\"{}\"", escape(class), escape(timestamp))?;
        let optional = [("CT", calendar_time), ("ST", stop_time), ("V", value), ("D", detail)];
        for (name, text) in optional {
            if !text.is_empty() {
                write!(self.out, " {name}=\"{}\"", escape(&sanitize_attribute(text)))?;
            }
        }
        writeln!(self.out, " />")?;
        Ok(())
    }

    /// A `<Text>` node with an optional extra attribute
    pub fn write_text_node(&mut self, class: &str, attribute: Option<(&str, &str)>, text: &str) -> Result<()> {
        write!(self.out, "    <Text C=\"{}\"", escape(class))?;
        if let Some((name, value)) = attribute.filter(|(n, v)| !n.is_empty() && !v.is_empty()) {
            write!(self.out, " {name}=\"{}\"", escape(&sanitize_attribute(value)))?;
        }
        writeln!(self.out, ">{}</Text>", escape(&sanitize_text(text)))?;
        Ok(())
    }

    /// Copy preformatted XML, such as a fragment from another file
    pub fn write_raw(&mut self, xml: &str) -> Result<()> {
        writeln!(self.out, "\n{xml}")?;
        Ok(())
    }

    /// Flush and return the underlying writer
    pub fn into_inner(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{Node, parse_fragment};
    use crate::reader::TdfHeader;

    /// Test sanitizers strip what would break the XML
    #[test]
    fn test_sanitizers() {
        assert_eq!(sanitize_data_value("Cr=>1.0, Na=<140, K=-3.5+"), "Cr1.0,Na140,K=3.5");
        assert_eq!(sanitize_attribute("<ICU>"), "ICU");
        assert_eq!(sanitize_text("a<b>=c"), "abc");
    }

    /// Test value-string helpers reject bad values
    #[test]
    fn test_append_helpers() {
        let mut values = String::new();
        assert!(append_name_value(&mut values, "Cr", "<1.5"));
        assert!(!append_name_value(&mut values, "Na", "high"));
        assert!(!append_name_value(&mut values, "", "1"));
        assert_eq!(values, "Cr=1.5,");

        let mut meds = String::new();
        assert!(append_med_info(&mut meds, "VancDose", "1000", "i", "2"));
        assert!(append_med_info(&mut meds, "Lasix", "40", "", ""));
        assert!(!append_med_info(&mut meds, "Lasix", "lots", "", ""));
        assert_eq!(meds, "VancDose:1000:i:2,Lasix:40:o:0,");

        let mut procs = String::new();
        assert!(append_proc_info(&mut procs, "EGD", "43235"));
        assert!(!append_proc_info(&mut procs, "", "43235"));
        assert_eq!(procs, "EGD:43235,");
    }

    /// Test written output parses back
    #[test]
    fn test_write_and_parse() {
        let mut writer = TdfWriter::new(Vec::new());
        writer.write_header("Unit & test", "Synthetic", "").unwrap();
        writer.start_timeline("42", "F", "").unwrap();
        writer.write_outcomes("F", "", "T").unwrap();
        writer.write_data_node("L", "100:08:00", "", "Cr=1.2,").unwrap();
        writer
            .write_event_node("Admit", "100:07:00", "", "", "Med", "Emergency")
            .unwrap();
        writer
            .write_text_node("Note", Some(("Author", "Dr <X>")), "x = 1 & y")
            .unwrap();
        writer.finish_timeline().unwrap();
        writer.write_footer().unwrap();
        assert_eq!(writer.timelines(), 1);
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        let header = TdfHeader::read(text.as_bytes(), 1 << 20).unwrap();
        assert_eq!(header.field("Description"), Some("Unit & test"));
        assert!(text.ends_with(FOOTER));

        let start = text.find("<TL ").unwrap();
        let end = text.find("</TL>").unwrap() + "</TL>".len();
        let fragment = parse_fragment(&text[start..end]).unwrap();
        assert_eq!(fragment.demographics.subject_id, "42");
        assert!(!fragment.demographics.is_male);
        assert_eq!(fragment.nodes.len(), 4);
        let Node::Outcome(outcome) = &fragment.nodes[0] else {
            panic!("outcome node expected");
        };
        assert_eq!(outcome.text, "DiedThisAdmission=F;Readmit30D=T");
        let Node::Text(note) = &fragment.nodes[3] else {
            panic!("text node expected");
        };
        assert_eq!(note.text, "x  1 & y");
    }
}
