use num::complex::Complex64;
use std::io::{Error, ErrorKind, Read};

/// A continuous supply of complex baseband samples.
pub trait SampleSource {
    /// Copies samples into the output buffer and returns how many were written.
    /// May block until samples are available. Returns 0 only at the end of the stream.
    fn read_samples(&mut self, out: &mut [Complex64]) -> std::io::Result<usize>;
}

/// Reads interleaved little-endian f64 (real, imaginary) pairs from a byte stream.
pub struct IqSampleReader<R: Read> {
    reader: R,
    scratch: Vec<u8>,
}

const BYTES_PER_SAMPLE: usize = 16;

impl<R: Read> IqSampleReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            scratch: Vec::new(),
        }
    }
}

impl<R: Read> SampleSource for IqSampleReader<R> {
    fn read_samples(&mut self, out: &mut [Complex64]) -> std::io::Result<usize> {
        self.scratch.resize(out.len() * BYTES_PER_SAMPLE, 0u8);

        let mut total_bytes = 0;
        while total_bytes < self.scratch.len() {
            match self.reader.read(&mut self.scratch[total_bytes..]) {
                Ok(0) => break,
                Ok(length) => total_bytes += length,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }

        if total_bytes % BYTES_PER_SAMPLE != 0 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "sample stream ended in the middle of an IQ pair",
            ));
        }

        let total_samples = total_bytes / BYTES_PER_SAMPLE;
        for (sample, bytes) in out
            .iter_mut()
            .zip(self.scratch[..total_bytes].chunks_exact(BYTES_PER_SAMPLE))
        {
            let re = f64::from_le_bytes(bytes[0..8].try_into().unwrap());
            let im = f64::from_le_bytes(bytes[8..16].try_into().unwrap());
            *sample = Complex64::new(re, im);
        }
        Ok(total_samples)
    }
}

/// In-memory source used by tests and fixture captures.
pub struct MemorySampleSource {
    samples: Vec<Complex64>,
    position: usize,
}

impl MemorySampleSource {
    pub fn new(samples: Vec<Complex64>) -> Self {
        Self {
            samples,
            position: 0,
        }
    }
}

impl SampleSource for MemorySampleSource {
    fn read_samples(&mut self, out: &mut [Complex64]) -> std::io::Result<usize> {
        let remain = self.samples.len() - self.position;
        let total = remain.min(out.len());
        out[..total].copy_from_slice(&self.samples[self.position..self.position + total]);
        self.position += total;
        Ok(total)
    }
}
