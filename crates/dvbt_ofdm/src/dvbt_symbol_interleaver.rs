/// Fills the symbol interleaver permutation H(q) used to shuffle data cells
/// across carriers.
pub fn get_dvbt_symbol_interleaver_map(permutation: &mut [usize], fft_size: usize) {
    // DOC: ETSI EN 300 744
    // Referring to clause 4.3.4.2 - Symbol interleaver
    // A 10-bit LFSR generates a sequence R', whose bits are shuffled by a
    // mode-dependent wire permutation and prefixed by the toggling MSB to
    // produce candidate addresses. Addresses beyond the payload are skipped.
    assert!(fft_size == 2048, "only the 2K symbol interleaver is defined");
    let total_cells = permutation.len();
    assert!(total_cells > 0);
    assert!(total_cells < fft_size);

    const BIT_PERMUTATION_2K: [usize; 10] = [4, 3, 9, 6, 2, 8, 1, 5, 7, 0];

    let mut register: u16 = 0;
    let mut out_index: usize = 0;
    for i in 0..fft_size {
        match i {
            0 | 1 => register = 0,
            2 => register = 1,
            _ => {
                let feedback = (register ^ (register >> 3)) & 1;
                register = (register >> 1) | (feedback << 9);
            }
        }

        let mut address = (i % 2) << 10;
        for (bit, &wire) in BIT_PERMUTATION_2K.iter().enumerate() {
            address |= (((register >> bit) & 1) as usize) << wire;
        }

        if address < total_cells {
            permutation[out_index] = address;
            out_index += 1;
        }
    }
    assert!(out_index == total_cells);
}
