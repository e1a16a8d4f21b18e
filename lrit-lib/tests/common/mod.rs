#![allow(dead_code)]

use lrit::file::{header_type, PrimaryHeader, RECORD_PREFIX_LEN};

pub fn record(header_type: u8, body: &[u8]) -> Vec<u8> {
    let mut dat = vec![header_type];
    dat.extend(((body.len() + RECORD_PREFIX_LEN) as u16).to_be_bytes());
    dat.extend(body);
    dat
}

/// Builds the bytes of a synthetic uncompressed 8-bit image segment file.
pub struct SegmentFile {
    pub spacecraft_id: u16,
    pub channel: u8,
    pub sequence: u16,
    pub planned_start: u16,
    pub planned_end: u16,
    pub bits_per_pixel: u8,
    pub columns: u16,
    pub lines: u16,
    pub compression: u8,
    /// CDS day and millisecond of day.
    pub timestamp: Option<(u16, u32)>,
    pub fill: u8,
}

impl SegmentFile {
    pub fn new(channel: u8, sequence: u16, planned_end: u16) -> Self {
        SegmentFile {
            spacecraft_id: 19,
            channel,
            sequence,
            planned_start: 1,
            planned_end,
            bits_per_pixel: 8,
            columns: 4,
            lines: 2,
            compression: 0,
            timestamp: Some((24106, 0)),
            fill: sequence as u8,
        }
    }

    pub fn at(mut self, day: u16, millis: u32) -> Self {
        self.timestamp = Some((day, millis));
        self
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut records = Vec::default();

        let mut body = vec![self.bits_per_pixel];
        body.extend(self.columns.to_be_bytes());
        body.extend(self.lines.to_be_bytes());
        body.push(self.compression);
        records.push(record(header_type::IMAGE_STRUCTURE, &body));

        let name = format!("L_{}_{:03}.lrit", self.channel, self.sequence);
        records.push(record(header_type::ANNOTATION, name.as_bytes()));

        if let Some((day, millis)) = self.timestamp {
            let mut body = vec![0x40];
            body.extend(day.to_be_bytes());
            body.extend(millis.to_be_bytes());
            records.push(record(header_type::TIMESTAMP, &body));
        }

        let mut body = Vec::default();
        body.extend(self.spacecraft_id.to_be_bytes());
        body.push(self.channel);
        body.extend(self.sequence.to_be_bytes());
        body.extend(self.planned_start.to_be_bytes());
        body.extend(self.planned_end.to_be_bytes());
        body.push(self.compression);
        records.push(record(header_type::SEGMENT_IDENTIFICATION, &body));

        let data = vec![self.fill; self.columns as usize * self.lines as usize];
        file_bytes(PrimaryHeader::IMAGE_DATA, &records, &data)
    }
}

pub fn file_bytes(file_type: u8, records: &[Vec<u8>], data: &[u8]) -> Vec<u8> {
    let header_len = PrimaryHeader::LEN + records.iter().map(Vec::len).sum::<usize>();
    let mut body = vec![file_type];
    body.extend((header_len as u32).to_be_bytes());
    body.extend((data.len() as u64 * 8).to_be_bytes());
    let mut dat = record(header_type::PRIMARY, &body);
    for r in records {
        dat.extend(r);
    }
    dat.extend(data);
    dat
}
