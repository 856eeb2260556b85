//! End-to-end: a container-format collaborator locates a metadata segment in a
//! JPEG-style stream and the engine swaps it while streaming.

use byte_patch::{apply, Edit, EditSet, PatchReader};
use std::io::Read;

/// APP0 "JFIF" segment header; bytes 2 and 3 are the segment length.
const JFIF_HEADER: &[u8] = b"\xff\xe0--JFIF\x00";
/// APP1 "Exif" segment header; bytes 2 and 3 are the segment length.
const EXIF_HEADER: &[u8] = b"\xff\xe1--Exif\x00\x00";

fn matches_header(segment: &[u8], header: &[u8]) -> bool {
    segment.len() >= header.len()
        && header
            .iter()
            .zip(segment)
            .enumerate()
            .all(|(i, (h, s))| i == 2 || i == 3 || h == s)
}

fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
    let len = (payload.len() + 2) as u16;
    let mut out = vec![0xff, marker];
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn exif_segment(body: &[u8]) -> Vec<u8> {
    let mut payload = b"Exif\x00\x00".to_vec();
    payload.extend_from_slice(body);
    segment(0xe1, &payload)
}

fn sample_image(exif_body: &[u8]) -> Vec<u8> {
    let mut image = vec![0xff, 0xd8];
    image.extend(segment(0xe0, b"JFIF\x00\x01\x02\x00\x00\x01\x00\x01\x00\x00"));
    image.extend(exif_segment(exif_body));
    image.extend(segment(0xdb, &[7u8; 67]));
    image.extend(segment(0xda, &[0, 1, 2]));
    image.extend((0..5000u32).map(|i| (i % 251) as u8));
    image.extend([0xff, 0xd9]);
    image
}

/// Byte ranges of the header segments up to start of scan.
fn header_segments(image: &[u8]) -> Vec<(u64, u64)> {
    let mut ranges = Vec::new();
    let mut pos = 2;
    while pos + 4 <= image.len() && image[pos] == 0xff {
        let marker = image[pos + 1];
        let len = u16::from_be_bytes([image[pos + 2], image[pos + 3]]) as usize + 2;
        ranges.push((pos as u64, len as u64));
        if marker == 0xda {
            break;
        }
        pos += len;
    }
    ranges
}

/// Edits that replace the first Exif segment with `replacement`, or delete it
/// when `replacement` is empty.
fn exif_edits(image: &[u8], replacement: Vec<u8>) -> EditSet {
    let mut edits = Vec::new();
    let mut seen_jfif = None;
    for (offset, size) in header_segments(image) {
        let start = offset as usize;
        let bytes = &image[start..start + size as usize];
        if seen_jfif.is_none() && matches_header(bytes, JFIF_HEADER) {
            let jfif = bytes.to_vec();
            seen_jfif = Some(jfif);
        } else if matches_header(bytes, EXIF_HEADER) {
            edits.push(Edit::new(offset, size, replacement));
            break;
        }
    }
    assert!(seen_jfif.is_some());
    EditSet::new(edits).unwrap()
}

#[test]
fn test_swap_exif_segment() {
    let image = sample_image(b"old metadata");
    let new_segment = exif_segment(b"a considerably longer replacement body");
    let edits = exif_edits(&image, new_segment.clone());
    assert_eq!(edits.len(), 1);

    let mut out = Vec::new();
    let written = apply(&image[..], &mut out, &edits).unwrap();

    assert_eq!(written as usize, out.len());
    assert_eq!(out, sample_image(b"a considerably longer replacement body"));

    // everything outside the segment is byte-identical
    let edit = edits.get(0).unwrap();
    let start = edit.offset as usize;
    let old_end = start + edit.size as usize;
    let new_end = start + new_segment.len();
    assert_eq!(out[..start], image[..start]);
    assert_eq!(out[new_end..], image[old_end..]);
}

#[test]
fn test_strip_exif_segment() {
    let image = sample_image(b"gps and camera");
    let edits = exif_edits(&image, Vec::new());

    let mut out = Vec::new();
    PatchReader::new(&image[..], &edits)
        .read_to_end(&mut out)
        .unwrap();

    assert!(header_segments(&out)
        .iter()
        .all(|&(offset, size)| {
            let start = offset as usize;
            !matches_header(&out[start..start + size as usize], EXIF_HEADER)
        }));
    assert_eq!(out.len(), image.len() - exif_segment(b"gps and camera").len());
}

#[test]
fn test_same_edits_on_many_images_concurrently() {
    let image = sample_image(b"shared");
    let edits = exif_edits(&image, exif_segment(b"replaced"));
    let expected = sample_image(b"replaced");

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let mut out = Vec::new();
                PatchReader::new(&image[..], &edits)
                    .read_to_end(&mut out)
                    .unwrap();
                assert_eq!(out, expected);
            });
        }
    });
}
