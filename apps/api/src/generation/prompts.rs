// All LLM prompt templates for the Generation module.

/// Job extraction prompt template. Replace `{page_data}` before sending.
pub const EXTRACT_JOBS_PROMPT_TEMPLATE: &str = r#"### SCRAPED TEXT FROM WEBSITE:
{page_data}

### INSTRUCTION:
The scraped text comes from the careers page of a company website.
Extract every job posting it contains and return them as a JSON array.
Each element MUST have exactly these keys:
  "role"        - job title (string)
  "experience"  - required experience, e.g. "3+ years" (string, "" if not stated)
  "skills"      - required skills and technologies (array of strings)
  "description" - short summary of the position (string)

If there is a single posting, still return an array with one element.
Only return the valid JSON. No extra text, no explanations, no markdown fences.

### VALID JSON (NO PREAMBLE):"#;

/// Cold email prompt template.
/// Replace: {job_description}, {link_list}, {sender_name}, {sender_title},
///          {company_name}, {company_pitch}
pub const COMPOSE_EMAIL_PROMPT_TEMPLATE: &str = r#"### JOB DESCRIPTION:
{job_description}

### INSTRUCTION:
You are {sender_name}, {sender_title} at {company_name}.
{company_name} {company_pitch}
Write a cold email to the hiring team about the job above, explaining how {company_name}
can fulfil their needs.
Include the most relevant portfolio links from this list to showcase past projects: {link_list}
Do not add a preamble. Only return the email body.

### EMAIL (NO PREAMBLE):"#;
