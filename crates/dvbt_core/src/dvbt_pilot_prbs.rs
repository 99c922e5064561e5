/// Generates the pilot-modulation sequence w_k for the first `length` carriers.
///
/// # DOC: ETSI EN 300 744
/// Referring to clause 4.5.2: the continual pilots, scattered pilots and the
/// initial TPS state are modulated by the PRBS generated by X^11 + X^2 + 1
/// with an all-ones initialisation, one bit per carrier index. A `true` entry
/// means the carrier's reference sign is inverted.
pub fn get_dvbt_pilot_prbs(length: usize) -> Vec<bool> {
    let mut register: u16 = 0x7FF;
    let mut sequence = Vec::with_capacity(length);
    for _ in 0..length {
        sequence.push(register & 1 == 1);
        let feedback = (register ^ (register >> 2)) & 1;
        register = (register >> 1) | (feedback << 10);
    }
    sequence
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_starts_with_eleven_ones() {
        let w = get_dvbt_pilot_prbs(16);
        assert_eq!(w.len(), 16);
        assert!(w[..11].iter().all(|&bit| bit));
        assert!(!w[11]);
        assert!(!w[12]);
    }

    #[test]
    fn sequence_is_balanced_over_a_full_period() {
        // A maximal length 11-bit LFSR emits 1024 ones and 1023 zeros.
        let w = get_dvbt_pilot_prbs(2047);
        let ones = w.iter().filter(|&&bit| bit).count();
        assert_eq!(ones, 1024);
    }
}
