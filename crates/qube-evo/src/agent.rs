//! Agent: binds one genome to the external generator.
//!
//! Stateless beyond the two references; created per population member and
//! discarded with it. Generator failures degrade to the deterministic
//! fallback text rather than propagating; the evolutionary loop never
//! surfaces a collaborator exception.

use qube_core::Generator;

use crate::genome::Genome;

/// One genome wired to a generator for the duration of an evaluation.
pub struct Agent<'a> {
    genome: &'a Genome,
    generator: Option<&'a dyn Generator>,
}

impl<'a> Agent<'a> {
    pub fn new(genome: &'a Genome, generator: Option<&'a dyn Generator>) -> Self {
        Agent { genome, generator }
    }

    pub fn genome(&self) -> &Genome {
        self.genome
    }

    /// Generate text for `prompt`. Without a generator (test wiring), or
    /// when the generator errors, returns the deterministic fallback
    /// `"{prompt} ||gen:{id6}|t{temp:.2}"`.
    pub fn generate(&self, prompt: &str, temperature: f32) -> String {
        match self.generator {
            Some(generator) => generator
                .generate(&self.genome.view(), prompt, temperature)
                .unwrap_or_else(|_| self.fallback(prompt, temperature)),
            None => self.fallback(prompt, temperature),
        }
    }

    fn fallback(&self, prompt: &str, temperature: f32) -> String {
        format!(
            "{} ||gen:{}|t{:.2}",
            prompt,
            self.genome.short_id(),
            temperature
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::GenomeMeta;
    use crate::rng::RngKey;
    use anyhow::Result;
    use qube_core::GenomeView;

    fn sample_genome() -> Genome {
        let mut rng = RngKey::new(4).to_rng();
        Genome::new(
            vec![0.0; 4],
            vec![0.0; 2],
            vec![0, 1],
            GenomeMeta::default(),
            &mut rng,
        )
    }

    #[test]
    fn test_fallback_without_generator() {
        let genome = sample_genome();
        let agent = Agent::new(&genome, None);
        let out = agent.generate("hello", 1.0);
        assert!(out.starts_with("hello ||gen:"));
        assert!(out.ends_with("|t1.00"));
        assert!(out.contains(genome.short_id()));
    }

    #[test]
    fn test_generator_is_used_when_present() {
        let genome = sample_genome();
        let gen = |_: &GenomeView<'_>, prompt: &str, _: f32| -> Result<String> {
            Ok(format!("echo {}", prompt))
        };
        let agent = Agent::new(&genome, Some(&gen));
        assert_eq!(agent.generate("hi", 0.5), "echo hi");
    }

    #[test]
    fn test_generator_error_degrades_to_fallback() {
        let genome = sample_genome();
        let gen = |_: &GenomeView<'_>, _: &str, _: f32| -> Result<String> {
            anyhow::bail!("backend down")
        };
        let agent = Agent::new(&genome, Some(&gen));
        let out = agent.generate("hi", 0.5);
        assert!(out.starts_with("hi ||gen:"));
    }
}
