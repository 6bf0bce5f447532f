use crate::{CriselError, Result};
use flate2::read::GzDecoder;
use memmap2::Mmap;
use nom::{
    bytes::complete::{tag, take_till},
    character::complete::{line_ending, not_line_ending},
    combinator::{map, opt},
    sequence::preceded,
    IResult,
};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// One single-record genome FASTA file, header split from the nucleotide body.
#[derive(Debug, Clone)]
pub struct FastaRecord {
    pub id: String,
    pub description: Option<String>,
    /// Uppercased nucleotide text with all whitespace removed.
    pub body: String,
}

impl FastaRecord {
    /// Chromosome number named in the header, if any.
    ///
    /// Recognizes `chromosome 2`, `chromosome2` and `chr2` in the id or
    /// description, case-insensitively.
    pub fn chromosome(&self) -> Option<u32> {
        let mut haystack = self.id.to_ascii_lowercase();
        if let Some(desc) = &self.description {
            haystack.push(' ');
            haystack.push_str(&desc.to_ascii_lowercase());
        }
        for key in ["chromosome", "chr"] {
            if let Some(pos) = haystack.find(key) {
                let rest = haystack[pos + key.len()..].trim_start_matches([' ', '_', '.']);
                let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
                if let Ok(n) = digits.parse::<u32>() {
                    return Some(n);
                }
            }
        }
        None
    }
}

/// Parse a FASTA header line
fn parse_header(input: &[u8]) -> IResult<&[u8], (&str, Option<&str>)> {
    let (input, _) = tag(b">")(input)?;
    let (input, id) = map(
        take_till(|c: u8| c == b' ' || c == b'\t' || c == b'\n' || c == b'\r'),
        |s| std::str::from_utf8(s).unwrap_or(""),
    )(input)?;
    let (input, description) = opt(preceded(
        tag(b" "),
        map(not_line_ending, |s| std::str::from_utf8(s).unwrap_or("")),
    ))(input)?;
    let (input, _) = line_ending(input)?;
    Ok((input, (id, description)))
}

/// Parse a single-record FASTA buffer into header plus stripped body.
pub fn parse_record(data: &[u8]) -> Result<FastaRecord> {
    let mut input = data;
    while !input.is_empty() && input[0].is_ascii_whitespace() {
        input = &input[1..];
    }

    let (rest, (id, description)) = parse_header(input)
        .map_err(|_| CriselError::Parse("failed to parse FASTA header".to_string()))?;

    let mut body = String::with_capacity(rest.len());
    for &c in rest {
        if c == b'>' {
            return Err(CriselError::Parse(
                "multi-record FASTA given where a single genome record was expected \
                 (split the file first)"
                    .to_string(),
            ));
        }
        if c.is_ascii_whitespace() {
            continue;
        }
        if !c.is_ascii_alphabetic() {
            return Err(CriselError::Parse(format!(
                "unexpected byte {:#04x} in nucleotide body",
                c
            )));
        }
        body.push(c.to_ascii_uppercase() as char);
    }

    Ok(FastaRecord {
        id: id.to_string(),
        description: description.map(|d| d.to_string()),
        body,
    })
}

/// Read a genome FASTA file (supports .gz compression).
pub fn read_fasta<P: AsRef<Path>>(path: P) -> Result<FastaRecord> {
    let path = path.as_ref();
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        let file = File::open(path)?;
        let mut decoder = GzDecoder::new(BufReader::new(file));
        let mut buffer = Vec::new();
        decoder.read_to_end(&mut buffer)?;
        parse_record(&buffer)
    } else {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        parse_record(&mmap[..])
    }
}

/// Genome identifier derived from a FASTA file name (stem without `.fasta[.gz]`).
pub fn genome_id<P: AsRef<Path>>(path: P) -> String {
    let mut name = path
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    for suffix in [".gz", ".fasta", ".fa", ".fna"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.to_string();
        }
    }
    name
}

/// Read the nucleotide body of a primary-chromosome genome file.
///
/// A file whose header names chromosome N > 1 is rejected: windows cut from
/// it alone would be misplaced, it may only be merged behind chromosome 1
/// via [`read_genome_merged`].
pub fn read_genome_body<P: AsRef<Path>>(path: P) -> Result<String> {
    let record = read_fasta(&path)?;
    if let Some(n) = record.chromosome() {
        if n > 1 {
            return Err(CriselError::Genome(format!(
                "{} encodes chromosome {}; non-primary chromosomes may only be \
                 loaded merged behind chromosome 1",
                path.as_ref().display(),
                n
            )));
        }
    }
    Ok(record.body)
}

/// Read and concatenate the bodies of chromosomes 1..K in chromosome order.
///
/// Concatenating before windowing keeps any window from spanning a
/// fabricated chromosome boundary. An unnumbered header counts as
/// chromosome 1; duplicate or missing numbers are rejected.
pub fn read_genome_merged<P: AsRef<Path>>(paths: &[P]) -> Result<String> {
    if paths.is_empty() {
        return Err(CriselError::Genome("no chromosome files given".to_string()));
    }

    let mut numbered: Vec<(u32, String)> = Vec::with_capacity(paths.len());
    for path in paths {
        let record = read_fasta(path)?;
        let n = record.chromosome().unwrap_or(1);
        numbered.push((n, record.body));
    }
    numbered.sort_by_key(|(n, _)| *n);

    for (i, (n, _)) in numbered.iter().enumerate() {
        let expect = i as u32 + 1;
        if *n != expect {
            return Err(CriselError::Genome(format!(
                "chromosome set is not contiguous: expected chromosome {}, found {}",
                expect, n
            )));
        }
    }

    let mut body = String::new();
    for (_, chunk) in numbered {
        body.push_str(&chunk);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let input = b">ecoli_k12 Escherichia coli K-12\nACGT";
        let (remaining, (id, desc)) = parse_header(input).unwrap();
        assert_eq!(id, "ecoli_k12");
        assert_eq!(desc, Some("Escherichia coli K-12"));
        assert_eq!(remaining, b"ACGT");
    }

    #[test]
    fn test_parse_record_strips_and_uppercases() {
        let record = parse_record(b">g1 test\nacgt\nACGT\n\n").unwrap();
        assert_eq!(record.id, "g1");
        assert_eq!(record.body, "ACGTACGT");
    }

    #[test]
    fn test_parse_record_rejects_second_record() {
        assert!(parse_record(b">g1\nACGT\n>g2\nTTTT\n").is_err());
    }

    #[test]
    fn test_parse_record_rejects_non_nucleotide_bytes() {
        assert!(parse_record(b">g1\nAC;GT\n").is_err());
    }

    #[test]
    fn test_chromosome_detection() {
        let rec = |desc: &str| FastaRecord {
            id: "g".to_string(),
            description: Some(desc.to_string()),
            body: String::new(),
        };
        assert_eq!(rec("Vibrio cholerae chromosome 2").chromosome(), Some(2));
        assert_eq!(rec("chromosome1").chromosome(), Some(1));
        assert_eq!(rec("chr3 assembly").chromosome(), Some(3));
        assert_eq!(rec("plain genome").chromosome(), None);
    }

    #[test]
    fn test_genome_id_from_path() {
        assert_eq!(genome_id("data/ecoli_k12.fasta"), "ecoli_k12");
        assert_eq!(genome_id("data/ecoli_k12.fasta.gz"), "ecoli_k12");
        assert_eq!(genome_id("vibrio.fa"), "vibrio");
    }

    #[test]
    fn test_read_genome_body_rejects_secondary_chromosome() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vc2.fasta");
        std::fs::write(&path, ">vc chromosome 2\nACGTACGT\n").unwrap();
        let err = read_genome_body(&path).unwrap_err();
        assert!(matches!(err, CriselError::Genome(_)));
    }

    #[test]
    fn test_read_genome_merged_orders_chromosomes() {
        let dir = tempfile::tempdir().unwrap();
        let c2 = dir.path().join("vc_chr2.fasta");
        let c1 = dir.path().join("vc_chr1.fasta");
        std::fs::write(&c2, ">vc chromosome 2\nGGGG\n").unwrap();
        std::fs::write(&c1, ">vc chromosome 1\nAAAA\n").unwrap();
        // Given out of order, merge still concatenates 1 then 2
        let body = read_genome_merged(&[&c2, &c1]).unwrap();
        assert_eq!(body, "AAAAGGGG");
    }

    #[test]
    fn test_read_genome_merged_rejects_gap() {
        let dir = tempfile::tempdir().unwrap();
        let c1 = dir.path().join("c1.fasta");
        let c3 = dir.path().join("c3.fasta");
        std::fs::write(&c1, ">vc chromosome 1\nAAAA\n").unwrap();
        std::fs::write(&c3, ">vc chromosome 3\nGGGG\n").unwrap();
        assert!(read_genome_merged(&[&c1, &c3]).is_err());
    }

    #[test]
    fn test_read_fasta_gzip() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.fasta.gz");
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(b">g compressed\nACGTACGT\n").unwrap();
        encoder.finish().unwrap();

        let record = read_fasta(&path).unwrap();
        assert_eq!(record.body, "ACGTACGT");
    }
}
