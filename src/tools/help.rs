//! Static help text for the tool set.

const HELP_TEXT: &str = "\
NCBI Sequence Fetcher - Available Tools:

1. get_nucleotide_sequence(accession)
   Fetch nucleotide sequence from NCBI in FASTA format
   Example accessions: NM_000546, NG_005905, NC_000023

2. get_protein_sequence(accession)
   Fetch protein sequence from NCBI in FASTA format
   Example accessions: NP_000537, P53_HUMAN

3. get_sequence_metadata(accession, db=\"nucleotide\")
   Get detailed metadata about a sequence in GenBank/GenPept format
   Databases: \"nucleotide\" or \"protein\"

4. search_ncbi(query, db=\"nucleotide\")
   Search NCBI databases and get a list of matching entries
   Example queries: \"BRCA1\", \"p53 tumor suppressor\", \"coronavirus spike\"
   Databases: \"nucleotide\", \"protein\", \"gene\", etc.

Example usage:
- \"Fetch the protein sequence for P53_HUMAN\"
- \"Get the nucleotide sequence for accession NM_000546\"
- \"Search NCBI for BRCA1 gene sequences\"
- \"Get detailed metadata for the TP53 gene\"
";

/// Help text listing every tool
pub fn help() -> &'static str {
    HELP_TEXT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_lists_every_tool() {
        let text = help();
        for name in [
            "get_nucleotide_sequence",
            "get_protein_sequence",
            "get_sequence_metadata",
            "search_ncbi",
        ] {
            assert!(text.contains(name), "help is missing {}", name);
        }
    }

    #[test]
    fn test_help_is_deterministic() {
        assert_eq!(help(), help());
        assert!(!help().is_empty());
    }
}
