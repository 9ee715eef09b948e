//! Prompt templates. Each template is sent with the selected context
//! appended and also serves as the similarity query for that context.

const EXTRACTION_PREAMBLE: &str = "You are a helpful assistant, brief and precise. \
You are extracting information from scraped crypto project websites.\n";

const NOT_FOUND_RULE: &str = "If there is no information in the text for a field then answer: No information found!\n";

const CHUNKS_HEADER: &str = "Text chunks from website:\n";

pub fn category() -> String {
    format!(
        "{EXTRACTION_PREAMBLE}\
Classify the project into one industry category (for example DeFi, GameFi, Infrastructure, AI, NFT, Meme) \
and decide whether the token is a memecoin: a token whose value is driven by community, jokes or internet culture \
rather than by a product.\n\
{NOT_FOUND_RULE}\
Answer format is parseable JSON!\n\
Example 1: {{\"category\": \"DeFi\", \"isMemecoin\": false}}\n\
Example 2: {{\"category\": \"Meme\", \"isMemecoin\": true}}\n\n\
{CHUNKS_HEADER}"
    )
}

pub fn token_identity() -> String {
    format!(
        "{EXTRACTION_PREAMBLE}\
Extract the name of the token, the token symbol, which chains the project is deployed on and any token contract addresses! \
The token can be referenced as coin! Sometimes the token symbol starts with a $ sign! \
Project tokens are often paired with other currencies like USD, ETH, SOL, etc.\n\
{NOT_FOUND_RULE}\
Answer format is parseable JSON!\n\
Example 1: {{\"tokenName\": \"ExampleToken\", \"tokenSymbol\": \"ET\", \"chains\": [\"Ethereum\", \"BSC\"], \"contractAddresses\": [\"0x6b175474e89094c44da98b954eedeac495271d0f\"]}}\n\
Example 2: {{\"tokenName\": \"DummyTokenName\", \"tokenSymbol\": \"TIA\", \"chains\": [\"Solana\"], \"contractAddresses\": [\"No information found\"]}}\n\
Example 3: {{\"tokenName\": \"No information found\", \"tokenSymbol\": \"TADA\", \"chains\": [\"No information found\"], \"contractAddresses\": [\"No information found\"]}}\n\n\
{CHUNKS_HEADER}"
    )
}

pub fn launchpad() -> String {
    format!(
        "{EXTRACTION_PREAMBLE}\
Extract all information about launchpad participation if the information is available!\n\
If launchpad participation is not mentioned then answer: No information found!\n\n\
{CHUNKS_HEADER}"
    )
}

pub fn industry_swot() -> String {
    format!(
        "{EXTRACTION_PREAMBLE}\
Name the industry the project competes in and list its strengths, weaknesses, opportunities and threats. \
Keep every item to one short sentence.\n\
{NOT_FOUND_RULE}\
Answer format is parseable JSON!\n\
Example: {{\"industry\": \"Decentralized lending\", \"strengths\": [\"Audited contracts\"], \"weaknesses\": [\"Small liquidity\"], \
\"opportunities\": [\"Growing on-chain credit market\"], \"threats\": [\"Established competitors\"]}}\n\n\
{CHUNKS_HEADER}"
    )
}

pub fn team() -> String {
    format!(
        "{EXTRACTION_PREAMBLE}\
List the team members and founders with their role and professional background, \
and whether the team is publicly identified (doxxed).\n\
{NOT_FOUND_RULE}\
Answer format is parseable JSON!\n\
Example: {{\"members\": [{{\"name\": \"Jane Doe\", \"role\": \"CEO\", \"background\": \"Former engineer at a major exchange\"}}], \"isDoxxed\": true}}\n\n\
{CHUNKS_HEADER}"
    )
}

pub fn tokenomics() -> String {
    format!(
        "{EXTRACTION_PREAMBLE}\
Extract the tokenomics: total supply, allocation of the supply between holders, vesting schedule and token utility.\n\
{NOT_FOUND_RULE}\
Answer format is parseable JSON!\n\
Example: {{\"totalSupply\": \"1,000,000,000\", \"allocations\": [{{\"holder\": \"Team\", \"share\": \"15%\"}}, {{\"holder\": \"Public sale\", \"share\": \"40%\"}}], \
\"vesting\": \"Team tokens locked for 12 months\", \"utility\": \"Governance and fee discounts\"}}\n\n\
{CHUNKS_HEADER}"
    )
}

const SCORING_RULES: &str = "Scoring Rules:\n\
- Team and Founders' Background (Reputability): experience, credibility and past achievements of the team.\n\
- Technology and Innovation: uniqueness, feasibility and scalability of the technology.\n\
- Whitepaper and Roadmap: clarity, detail and feasibility.\n\
- Community Support and Engagement: social activity and community growth.\n\
- Market Potential and Use Case: market demand and real-world application.\n\
- Tokenomics: token distribution, supply mechanics and economic model.\n\
- Regulatory Compliance: fit with legal and regulatory frameworks.\n\
- Partnerships and Collaborations: ties with established companies or projects.\n\
- Security Aspects: smart contract audits and protection of stakeholders.\n\
- Development Activity: regular updates and active development.\n\
- Transparency: clear communication about progress and challenges.\n\
- Competitive Advantage: how the project stands out from competitors.\n\n";

const SCORE_FORMAT: &str = "Response format:\n\
Parseable JSON and nothing else! The JSON must have these keys:\n\
- score: integer, min 1, max 10; a median score for the project.\n\
- description: string; a structured explanation of how the score was determined, including pros and cons.\n\n\
Response example:\n\
{\"score\": 6, \"description\": \"A structured example explanation with the requested points ...\"}\n\n\
List of possibly relevant segments from project documentation:\n";

/// Fundamentals-first scoring.
pub fn strict_score() -> String {
    format!(
        "Custom AI Assistant for Crypto-Project Analysis: \"The Next 100x Gem\"\n\n\
Objective:\n\
You are analyzing and scoring early-stage crypto projects (like IDO/ICO) on a scale from 1 to 10. \
Your scores guide investors looking for rare projects with a real possibility of growth.\n\n\
Scoring Methodology:\n\
- Weighted Scoring: assign scores to the aspects below based on their significance and report the median of the weighted points.\n\
- Incomplete Data Handling: provide a score even if some data is missing.\n\n\
{SCORING_RULES}\
Do not forget:\n\
- Be very exigent and reserve good scores for serious projects with real utility and value. Say it is bad when it is.\n\
- Do not believe naively what the project owners say, they are certainly doing more marketing than reality. \
More information does not mean the project is better.\n\
- Explain why the project deserves the score and list pros and cons of the concept.\n\n\
{SCORE_FORMAT}"
    )
}

/// Community and momentum scoring for meme assets.
pub fn hype_score() -> String {
    format!(
        "Custom AI Assistant for Meme Coin Analysis: \"The Next Viral Token\"\n\n\
Objective:\n\
You are scoring a meme token on a scale from 1 to 10 by its potential to attract attention and community during a meme season. \
Fundamentals matter less than virality.\n\n\
Scoring Rules:\n\
- Meme Strength: how catchy, original and shareable the concept and branding are.\n\
- Community: size, activity and enthusiasm of the community and its channels.\n\
- Launch Fairness: fair launch, locked liquidity, renounced contract, no large insider allocations.\n\
- Tokenomics: supply, taxes and distribution that do not punish holders.\n\
- Red Flags: anonymous team promising returns, copied websites, unrealistic claims.\n\n\
Do not forget:\n\
- Most meme tokens fail. Reserve high scores for the rare ones with a strong meme and an organic community.\n\
- Explain the score and list pros and cons.\n\n\
{SCORE_FORMAT}"
    )
}

/// One-sentence synthesis of the provider opinions, in provider order.
pub fn summary(opinions: &[String]) -> String {
    let mut prompt = String::from("Summarize the project in one sentence!");
    for (index, opinion) in opinions.iter().enumerate() {
        prompt.push_str(&format!("\nOpinion {}:\n{opinion}\n", index + 1));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_templates_state_the_sentinel_and_json_format() {
        for template in [category(), token_identity(), industry_swot(), team(), tokenomics()] {
            assert!(template.contains("No information found"));
            assert!(template.contains("parseable JSON"));
            assert!(template.ends_with(CHUNKS_HEADER));
        }
    }

    #[test]
    fn summary_numbers_opinions_in_order() {
        let prompt = summary(&["first".to_string(), "second".to_string()]);
        assert!(prompt.starts_with("Summarize the project in one sentence!"));
        let first = prompt.find("Opinion 1:\nfirst").expect("first opinion");
        let second = prompt.find("Opinion 2:\nsecond").expect("second opinion");
        assert!(first < second);
    }

    #[test]
    fn scoring_templates_differ() {
        assert_ne!(strict_score(), hype_score());
        assert!(strict_score().contains("\"score\": 6"));
    }
}
