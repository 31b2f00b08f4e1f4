//! Offline search corpus for demo mode and tests.

use airesearch_core::{CapabilityError, SearchProvider, SourceSnippet};
use async_trait::async_trait;
use tracing::debug;

type Entry = (&'static str, &'static str, &'static str);

const AI_HEALTHCARE: &[Entry] = &[
    (
        "AI in Healthcare: Transforming Patient Care",
        "https://example.com/ai-healthcare-1",
        "Artificial intelligence is revolutionizing healthcare through improved diagnostics, personalized treatment plans, and predictive analytics. AI algorithms can analyze medical images with accuracy comparable to human radiologists, helping detect diseases like cancer at earlier stages.",
    ),
    (
        "Machine Learning Applications in Medicine",
        "https://example.com/ai-healthcare-2",
        "Machine learning models are being used to predict patient outcomes, optimize hospital operations, and assist in drug discovery. These technologies are helping healthcare providers make more informed decisions and improve patient care quality.",
    ),
    (
        "The Future of AI-Powered Healthcare",
        "https://example.com/ai-healthcare-3",
        "From virtual health assistants to robotic surgery, AI is expanding the possibilities in healthcare. Recent developments include AI systems that can detect diseases earlier and more accurately than traditional methods, leading to better patient outcomes.",
    ),
    (
        "AI Ethics in Medical Practice",
        "https://example.com/ai-healthcare-4",
        "As AI becomes more prevalent in healthcare, ethical considerations around patient privacy, algorithmic bias, and accountability are crucial. Medical professionals and policymakers are working to establish guidelines for responsible AI use.",
    ),
    (
        "Real-World AI Healthcare Success Stories",
        "https://example.com/ai-healthcare-5",
        "Healthcare institutions worldwide are reporting significant improvements in patient outcomes using AI. Case studies show reduced diagnosis times, improved treatment accuracy, and better resource allocation in hospitals.",
    ),
];

const ARTIFICIAL_INTELLIGENCE: &[Entry] = &[
    (
        "Understanding Artificial Intelligence",
        "https://example.com/ai-overview",
        "Artificial Intelligence (AI) refers to computer systems that can perform tasks typically requiring human intelligence. This includes learning, reasoning, problem-solving, and understanding language.",
    ),
    (
        "AI Technology Trends 2024",
        "https://example.com/ai-trends",
        "The AI landscape is rapidly evolving with breakthroughs in large language models, computer vision, and autonomous systems. Companies are investing billions in AI research and development.",
    ),
    (
        "Applications of AI Across Industries",
        "https://example.com/ai-applications",
        "AI is being applied across healthcare, finance, transportation, education, and entertainment. From chatbots to self-driving cars, AI technologies are transforming how we live and work.",
    ),
];

const MACHINE_LEARNING: &[Entry] = &[
    (
        "Machine Learning Fundamentals",
        "https://example.com/ml-basics",
        "Machine learning is a subset of AI that enables systems to learn and improve from experience without explicit programming. It uses algorithms to identify patterns in data.",
    ),
    (
        "Types of Machine Learning",
        "https://example.com/ml-types",
        "The three main types of machine learning are supervised learning, unsupervised learning, and reinforcement learning. Each has different applications and use cases.",
    ),
    (
        "Real-World ML Applications",
        "https://example.com/ml-applications",
        "Machine learning powers recommendation systems, fraud detection, image recognition, and natural language processing. Companies use ML to gain insights from large datasets.",
    ),
];

const CLIMATE_CHANGE: &[Entry] = &[
    (
        "Climate Change: Current State",
        "https://example.com/climate-overview",
        "Global temperatures continue to rise, with 2024 on track to be one of the warmest years on record. Scientists warn of increasing extreme weather events and sea level rise.",
    ),
    (
        "Climate Solutions and Mitigation",
        "https://example.com/climate-solutions",
        "Renewable energy, carbon capture, and sustainable practices offer pathways to reduce emissions. Countries are implementing policies to achieve net-zero targets.",
    ),
    (
        "Impact on Global Ecosystems",
        "https://example.com/climate-impact",
        "Climate change affects biodiversity, agriculture, and human health. Ecosystems are struggling to adapt to rapid environmental changes.",
    ),
];

const QUANTUM_COMPUTING: &[Entry] = &[
    (
        "Introduction to Quantum Computing",
        "https://example.com/quantum-intro",
        "Quantum computers use quantum mechanical phenomena to solve complex problems faster than classical computers. They leverage qubits instead of traditional bits.",
    ),
    (
        "Quantum Computing Applications",
        "https://example.com/quantum-apps",
        "Potential applications include cryptography, drug discovery, optimization problems, and materials science. Major tech companies are racing to build practical quantum computers.",
    ),
    (
        "Challenges in Quantum Computing",
        "https://example.com/quantum-challenges",
        "Quantum systems are fragile and require extremely low temperatures. Error correction and scaling remain significant technical hurdles.",
    ),
];

const GENERAL: &[Entry] = &[
    (
        "Research Topic Overview",
        "https://example.com/overview",
        "This topic encompasses various aspects including recent developments, practical applications, and future implications. Research shows significant interest and ongoing innovation in this field.",
    ),
    (
        "Latest Developments and Trends",
        "https://example.com/trends",
        "Current trends indicate growing adoption and increasing investment. Experts predict continued growth and evolution in the coming years with new applications emerging regularly.",
    ),
    (
        "Practical Applications",
        "https://example.com/applications",
        "Real-world implementations demonstrate the value and potential of this technology. Organizations across industries are finding innovative ways to leverage these capabilities for competitive advantage.",
    ),
    (
        "Challenges and Considerations",
        "https://example.com/challenges",
        "While promising, this field faces several challenges including technical limitations, ethical concerns, and regulatory questions that need to be addressed.",
    ),
    (
        "Future Outlook",
        "https://example.com/future",
        "The future looks bright with continued innovation expected. Researchers and practitioners are optimistic about upcoming breakthroughs and wider adoption.",
    ),
];

/// Words too common to identify a topic on their own.
const IGNORED_WORDS: &[&str] = &["in", "of", "the", "and", "for", "on", "a", "an", "to"];

fn to_snippets(entries: &[Entry]) -> Vec<SourceSnippet> {
    entries
        .iter()
        .map(|(title, url, excerpt)| SourceSnippet::new(*title, *url, *excerpt))
        .collect()
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Canned results keyed by topic, with a general fallback.
pub struct DemoSearch {
    topics: Vec<(String, Vec<SourceSnippet>)>,
    fallback: Vec<SourceSnippet>,
}

impl Default for DemoSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoSearch {
    pub fn new() -> Self {
        let topics = [
            ("artificial intelligence in healthcare", AI_HEALTHCARE),
            ("artificial intelligence", ARTIFICIAL_INTELLIGENCE),
            ("machine learning", MACHINE_LEARNING),
            ("climate change", CLIMATE_CHANGE),
            ("quantum computing", QUANTUM_COMPUTING),
        ]
        .into_iter()
        .map(|(key, entries)| (key.to_string(), to_snippets(entries)))
        .collect();

        Self {
            topics,
            fallback: to_snippets(GENERAL),
        }
    }

    /// Register extra canned results; later registrations win ties.
    pub fn with_topic(mut self, key: &str, snippets: Vec<SourceSnippet>) -> Self {
        self.topics.insert(0, (key.trim().to_lowercase(), snippets));
        self
    }

    /// Best corpus entry for `query`: a full key phrase beats partial word overlap.
    pub fn lookup(&self, query: &str) -> &[SourceSnippet] {
        let query_words = words(query);
        let phrase = format!(" {} ", query_words.join(" "));

        let mut best: Option<(bool, usize, &[SourceSnippet])> = None;
        for (key, snippets) in &self.topics {
            let key_words = words(key);
            let full_match = phrase.contains(&format!(" {} ", key_words.join(" ")));
            let overlap = key_words
                .iter()
                .filter(|word| !IGNORED_WORDS.contains(&word.as_str()))
                .filter(|word| query_words.contains(word))
                .count();
            if !full_match && overlap == 0 {
                continue;
            }

            let better = match best {
                None => true,
                Some((best_full, best_overlap, _)) => {
                    (full_match, overlap) > (best_full, best_overlap)
                }
            };
            if better {
                best = Some((full_match, overlap, snippets.as_slice()));
            }
        }

        best.map(|(_, _, snippets)| snippets)
            .unwrap_or(self.fallback.as_slice())
    }
}

#[async_trait]
impl SearchProvider for DemoSearch {
    fn name(&self) -> &str {
        "demo"
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SourceSnippet>, CapabilityError> {
        let results: Vec<SourceSnippet> = self.lookup(query).iter().take(limit).cloned().collect();
        debug!(%query, results = results.len(), "demo search served");
        Ok(results)
    }
}
