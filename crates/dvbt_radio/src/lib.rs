pub mod viterbi_decoder;
