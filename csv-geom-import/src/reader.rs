//! Lecture du CSV en continu: décodage, lots d'enregistrements et choix des
//! colonnes géométrie

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ByteRecord, ReaderBuilder, StringRecord};
use encoding_rs::{CoderResult, Decoder, Encoding};
use geomsniff::{detect_text, FormatTag, RowInput};
use tracing::{debug, info, warn};

use crate::config::ImportConfig;

/// Noms de colonnes reconnus comme géométrie
const GEOMETRY_KEYWORDS: [&str; 10] = [
    "geometry",
    "geom",
    "wkt",
    "wkb",
    "shape",
    "the_geom",
    "geojson",
    "geo_json",
    "coordinates",
    "coord",
];

/// Noms de colonnes reconnus comme X (longitude)
const X_KEYWORDS: [&str; 8] = [
    "lon",
    "longitude",
    "lng",
    "x",
    "long",
    "x_coord",
    "xcoord",
    "easting",
];

/// Noms de colonnes reconnus comme Y (latitude)
const Y_KEYWORDS: [&str; 6] = ["lat", "latitude", "y", "y_coord", "ycoord", "northing"];

/// Enregistrements lus d'avance pour choisir les colonnes géométrie
pub const SAMPLE_PREFIX: usize = 1000;

/// Taille du tampon de sortie du décodeur
const DECODE_BUFFER: usize = 8 * 1024;

/// Ouvre le fichier d'entrée et le présente en UTF-8
///
/// Un BOM l'emporte sur l'encodage configuré. L'UTF-8 est lu tel quel
/// (BOM retiré), les autres encodages passent par un décodeur encoding_rs.
pub fn open_decoded(path: &Path, label: &str) -> Result<Box<dyn Read>> {
    let encoding = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| anyhow::anyhow!("Unknown encoding: {}", label))?;

    let file =
        File::open(path).context(format!("Failed to read input file: {}", path.display()))?;
    let mut input = BufReader::new(file);

    let bom = Encoding::for_bom(
        input
            .fill_buf()
            .context(format!("Failed to read input file: {}", path.display()))?,
    );
    let encoding = bom.map_or(encoding, |(detected, _)| detected);

    if encoding == encoding_rs::UTF_8 {
        if let Some((_, bom_len)) = bom {
            input.consume(bom_len);
        }
        return Ok(Box::new(input));
    }

    debug!("Decoding input as {}", encoding.name());
    Ok(Box::new(DecodeReader::new(input, encoding)))
}

/// Adaptateur `Read` qui transcode vers UTF-8 au fil de la lecture
pub struct DecodeReader<R> {
    inner: R,
    decoder: Decoder,
    out: Box<[u8]>,
    start: usize,
    end: usize,
    done: bool,
    had_errors: bool,
}

impl<R: BufRead> DecodeReader<R> {
    pub fn new(inner: R, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            decoder: encoding.new_decoder_with_bom_removal(),
            out: vec![0; DECODE_BUFFER].into_boxed_slice(),
            start: 0,
            end: 0,
            done: false,
            had_errors: false,
        }
    }

    /// Vrai si des octets ont été remplacés par U+FFFD
    pub fn had_errors(&self) -> bool {
        self.had_errors
    }

    fn refill(&mut self) -> io::Result<()> {
        let src = self.inner.fill_buf()?;
        let last = src.is_empty();
        let (result, read, written, had_errors) =
            self.decoder.decode_to_utf8(src, &mut self.out, last);
        self.inner.consume(read);
        self.start = 0;
        self.end = written;

        if had_errors && !self.had_errors {
            self.had_errors = true;
            warn!(
                "Some bytes could not be decoded as {}, replaced",
                self.decoder.encoding().name()
            );
        }
        if last && result == CoderResult::InputEmpty {
            self.done = true;
        }
        Ok(())
    }
}

impl<R: BufRead> Read for DecodeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.start == self.end && !self.done {
            self.refill()?;
        }
        let n = buf.len().min(self.end - self.start);
        buf[..n].copy_from_slice(&self.out[self.start..self.start + n]);
        self.start += n;
        Ok(n)
    }
}

/// CSV lu en continu: en-têtes, échantillon de tête, puis lots
///
/// Seuls les enregistrements de l'échantillon sont gardés en mémoire
/// avant le premier lot.
pub struct CsvSource<R> {
    pub headers: Vec<String>,
    reader: csv::Reader<R>,
    /// Échantillon de tête, rendu en premier par `next_batch`
    prefix: VecDeque<StringRecord>,
    /// Enregistrements physiques lus (en-tête compris)
    records_read: usize,
    /// Enregistrements dont l'UTF-8 invalide a été remplacé
    lossy_records: usize,
}

impl CsvSource<Box<dyn Read>> {
    /// Ouvre le fichier selon la configuration
    pub fn open(path: &Path, config: &ImportConfig, prefix_len: usize) -> Result<Self> {
        let input = open_decoded(path, &config.encoding)?;
        Self::new(input, config, prefix_len)
    }
}

impl<R: Read> CsvSource<R> {
    /// Lit les en-têtes et les `prefix_len` premiers enregistrements
    ///
    /// Sans en-tête, les colonnes sont nommées `Column_1`, `Column_2`...
    /// d'après l'enregistrement le plus large de l'échantillon.
    pub fn new(input: R, config: &ImportConfig, prefix_len: usize) -> Result<Self> {
        let reader = ReaderBuilder::new()
            .delimiter(config.delimiter_byte()?)
            .has_headers(false)
            .flexible(true)
            .from_reader(input);

        let mut source = Self {
            headers: Vec::new(),
            reader,
            prefix: VecDeque::new(),
            records_read: 0,
            lossy_records: 0,
        };

        if config.has_header {
            if let Some(record) = source.read_record()? {
                source.headers = record.iter().map(|h| h.trim().to_string()).collect();
            }
        }

        while source.prefix.len() < prefix_len {
            match source.read_record()? {
                Some(record) => source.prefix.push_back(record),
                None => break,
            }
        }

        if !config.has_header {
            let width = source.prefix.iter().map(StringRecord::len).max().unwrap_or(0);
            source.headers = (1..=width).map(|i| format!("Column_{}", i)).collect();
        }

        Ok(source)
    }

    fn read_record(&mut self) -> Result<Option<StringRecord>> {
        let mut record = ByteRecord::new();
        self.records_read += 1;
        let more = self
            .reader
            .read_byte_record(&mut record)
            .context(format!("Malformed CSV at record {}", self.records_read))?;
        if !more {
            return Ok(None);
        }

        Ok(Some(match StringRecord::from_byte_record(record) {
            Ok(record) => record,
            Err(e) => {
                if self.lossy_records == 0 {
                    warn!(
                        "Input is not valid UTF-8 (record {}), invalid sequences replaced",
                        self.records_read
                    );
                }
                self.lossy_records += 1;
                StringRecord::from_byte_record_lossy(e.into_byte_record())
            }
        }))
    }

    /// Prochain lot d'au plus `size` enregistrements, vide en fin de fichier
    pub fn next_batch(&mut self, size: usize) -> Result<Vec<StringRecord>> {
        let mut batch = Vec::with_capacity(size.min(SAMPLE_PREFIX));
        while batch.len() < size {
            let record = match self.prefix.pop_front() {
                Some(record) => record,
                None => match self.read_record()? {
                    Some(record) => record,
                    None => break,
                },
            };
            batch.push(record);
        }
        Ok(batch)
    }

    /// Enregistrements dont l'UTF-8 invalide a été remplacé
    pub fn lossy_records(&self) -> usize {
        self.lossy_records
    }

    /// Index d'une colonne par nom (insensible à la casse)
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown column: {}. Available: {}",
                    name,
                    self.headers.join(", ")
                )
            })
    }

    /// Premières valeurs non vides d'une colonne dans l'échantillon de tête
    pub fn samples(&self, column: usize, limit: usize) -> impl Iterator<Item = &str> {
        self.prefix
            .iter()
            .filter_map(move |r| r.get(column))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .take(limit)
    }
}

/// Colonne(s) portant la géométrie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryColumns {
    /// Une cellule texte (WKT, WKB, GeoJSON...)
    Single(usize),
    /// Deux colonnes numériques
    Pair { x: usize, y: usize },
}

impl GeometryColumns {
    /// Valeurs de la ligne à classer
    pub fn row_input<'r>(&self, record: &'r StringRecord) -> RowInput<'r> {
        match *self {
            GeometryColumns::Single(i) => RowInput {
                raw: record.get(i),
                x: None,
                y: None,
            },
            GeometryColumns::Pair { x, y } => RowInput {
                raw: None,
                x: record.get(x),
                y: record.get(y),
            },
        }
    }

    /// Vrai si la colonne porte la géométrie (exclue des propriétés)
    pub fn contains(&self, column: usize) -> bool {
        match *self {
            GeometryColumns::Single(i) => i == column,
            GeometryColumns::Pair { x, y } => x == column || y == column,
        }
    }

    /// Texte de la valeur brute pour les rapports
    pub fn describe(&self, headers: &[String]) -> String {
        let name = |i: usize| headers.get(i).map(String::as_str).unwrap_or("?");
        match *self {
            GeometryColumns::Single(i) => name(i).to_string(),
            GeometryColumns::Pair { x, y } => format!("{} / {}", name(x), name(y)),
        }
    }
}

/// Choisit les colonnes géométrie
///
/// Ordre: colonnes configurées, puis noms usuels, puis contenu de
/// l'échantillon de tête.
pub fn resolve_columns<R: Read>(
    table: &CsvSource<R>,
    config: &ImportConfig,
    hint: Option<FormatTag>,
) -> Result<GeometryColumns> {
    if let (Some(x), Some(y)) = (&config.x_column, &config.y_column) {
        return Ok(GeometryColumns::Pair {
            x: table.column_index(x)?,
            y: table.column_index(y)?,
        });
    }

    if hint != Some(FormatTag::Xy) {
        if let Some(name) = &config.geometry_column {
            return Ok(GeometryColumns::Single(table.column_index(name)?));
        }

        if let Some(i) = find_header(&table.headers, &GEOMETRY_KEYWORDS) {
            info!("Geometry column detected by name: {}", table.headers[i]);
            return Ok(GeometryColumns::Single(i));
        }
    }

    if let (Some(x), Some(y)) = (
        find_header(&table.headers, &X_KEYWORDS),
        find_header(&table.headers, &Y_KEYWORDS),
    ) {
        info!(
            "Coordinate columns detected by name: {} / {}",
            table.headers[x], table.headers[y]
        );
        return Ok(GeometryColumns::Pair { x, y });
    }

    if hint == Some(FormatTag::Xy) {
        anyhow::bail!("The X-Y format needs x_column and y_column");
    }

    // Contenu: première colonne dont un échantillon est reconnu
    for column in 0..table.headers.len() {
        let recognized = table
            .samples(column, 20)
            .any(|v| detect_text(v) != FormatTag::Unknown);
        if recognized {
            info!("Geometry column detected by content: {}", table.headers[column]);
            return Ok(GeometryColumns::Single(column));
        }
    }

    anyhow::bail!(
        "No geometry column found. Available: {}",
        table.headers.join(", ")
    )
}

fn find_header(headers: &[String], keywords: &[&str]) -> Option<usize> {
    keywords.iter().find_map(|keyword| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(keyword))
    })
}
