pub const CASE_TEXT_PLACEHOLDER: &str = "{case_text}";

pub const SUMMARY_PROMPT: &str = r####"
Based on all the following crime case details, please provide a concise summary
in one or two sentences. Focus on the key aspects like the type of crime,
location (if available), and main circumstances. Maintain a professional tone.

Case Details (All Columns):
---
{case_text}
---
Summary:
"####;

pub const PRIORITY_PROMPT: &str = r####"
Objectively analyze all the following crime case details. Assign a priority level: High, Medium, or Low.
Provide a detailed, professional justification for this priority level. Your reasoning should explicitly reference specific details or data points from the case information provided below that influenced your assessment. Consider factors such as:
- Severity, violence, or nature of the crime described.
- Urgency suggested by dates, timelines, or ongoing threats mentioned.
- Indications of victim vulnerability (e.g., age, circumstances).
- Status or nature of evidence mentioned (e.g., availability, type).
- Any other factors objectively derived from the provided data.

Format your response as follows:
Priority Level: [High/Medium/Low]
Reasoning: [Detailed justification referencing specific case details]

Case Details (All Columns):
---
{case_text}
---
Priority Assessment:
"####;
