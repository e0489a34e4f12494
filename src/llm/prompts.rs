//! Persian prompt templates.
//!
//! Output-shape templates are JSON literals embedded in `format!` strings,
//! so braces are doubled.

/// Sent by every connection check; mentions "json" so JSON mode accepts it.
pub const CONNECTION_TEST_PROMPT: &str =
    "Respond with a simple json object containing only 'status': 'OK' if you can read this message.";

/// `1234567` → `1,234,567`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyword clustering
// ─────────────────────────────────────────────────────────────────────────────

pub const CLUSTER_SYSTEM: &str = "شما یک متخصص استراتژی محتوای SEO برای زبان فارسی هستید. وظیفه شما گروه‌بندی کوئری‌های جستجو در کلاسترهای موضوعی است که برای تولید مقالات مجزا منطقی باشند.

**نکات مهم:**
- تمام خروجی‌ها باید کاملاً به زبان فارسی باشند
- از کلمات انگلیسی استفاده نکنید
- به الگوهای جستجوی فارسی و نگارش‌های مختلف توجه کنید
- intent کاربران ایرانی را در نظر بگیرید
- خروجی را فقط به صورت JSON معتبر برگردانید";

/// Keywords beyond this many are left out of the clustering prompt.
pub const CLUSTER_KEYWORD_LIMIT: usize = 100;

pub fn cluster_prompt(keywords: &[String]) -> String {
    let keywords_list = keywords
        .iter()
        .take(CLUSTER_KEYWORD_LIMIT)
        .map(|kw| format!("- {}", kw))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"**تحلیل کوئری‌های جستجو و تولید کلاسترهای محتوایی:**

**کوئری‌های ورودی:**
{keywords_list}

**وظیفه:**
این کوئری‌های جستجو را بر اساس تشابه معنایی و intent کاربر در کلاسترهای موضوعی گروه‌بندی کن. برای هر کلاستر، اطلاعات زیر را تولید کن:

1. **موضوع اصلی کلاستر** (به فارسی)
2. **کلیدواژه‌های مرتبط** از لیست ورودی
3. **عنوان پیشنهادی مقاله (H1)** - بهینه شده برای SEO فارسی، حداکثر ۶۰ کاراکتر
4. **ساختار هدینگ‌های H2** - بین ۵ تا ۸ عنوان، به فارسی و مطابق با search intent
5. **متا دیسکریپشن** - حداکثر ۱۶۰ کاراکتر، جذاب و شامل کلیدواژه اصلی
6. **نوع محتوا** - یکی از: راهنما/آموزش/مقایسه/لیست/تحلیل/نقد/بررسی
7. **Search Intent** - یکی از: اطلاعاتی/تجاری/معاملاتی/ناوبری

**فرمت خروجی JSON (فقط این خروجی را برگردان):**
{{
  "clusters": [
    {{
      "main_topic": "موضوع اصلی به فارسی",
      "keywords": ["کلیدواژه۱", "کلیدواژه۲"],
      "article_title": "عنوان مقاله بهینه شده برای SEO",
      "meta_description": "توضیحات متا جذاب و کوتاه",
      "h2_headings": ["هدینگ ۱", "هدینگ ۲", "هدینگ ۳"],
      "content_type": "راهنما",
      "search_intent": "اطلاعاتی",
      "recommended_word_count": 1500,
      "target_audience": "مخاطبان ایرانی",
      "content_focus": "تمرکز بر نیازهای کاربران فارسی‌زبان"
    }}
  ]
}}

**نکات مهم:**
- تعداد کلاسترها را بر اساس تشابه معنایی تعیین کن (نه تعداد ثابت)
- هر کلیدواژه فقط در یک کلاستر باشد
- حداقل ۲ کلیدواژه در هر کلاستر، اما کیفیت مهم‌تر از تعداد است
- در هدینگ‌ها به الگوهای جستجوی فارسی توجه کن
- فقط کلیدواژه‌های لیست ورودی را استفاده کن"#
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Existing-page improvements
// ─────────────────────────────────────────────────────────────────────────────

pub const IMPROVEMENT_SYSTEM: &str = "شما یک متخصص بهینه‌سازی محتوای SEO برای زبان فارسی هستید. وظیفه شما ارائه پیشنهادات مشخص و عملی برای بهبود عملکرد محتوا در نتایج جستجوی گوگل است.

**نکات مهم:**
- تمام خروجی‌ها باید کاملاً به زبان فارسی باشند
- از کلمات انگلیسی استفاده نکنید
- به ویژگی‌های خاص الگوریتم گوگل برای محتوای فارسی توجه کنید
- رفتار کاربران ایرانی را در نظر بگیرید
- بهترین شیوه‌های SEO فارسی را اعمال کنید
- خروجی را فقط به صورت JSON معتبر برگردانید";

pub const IMPROVEMENT_KEYWORD_LIMIT: usize = 10;

pub fn improvement_prompt(url: &str, keywords: &[String], position: f64, impressions: u64) -> String {
    let keywords_str = keywords
        .iter()
        .take(IMPROVEMENT_KEYWORD_LIMIT)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    let impressions = group_thousands(impressions);

    format!(
        r#"**تحلیل و بهینه‌سازی محتوای موجود:**

**اطلاعات صفحه:**
- آدرس: {url}
- کلیدواژه‌های رتبه‌بندی شده: {keywords_str}
- میانگین موقعیت: {position:.1}
- مجموع نمایش‌ها (Impressions): {impressions}

**وظیفه:**
این صفحه را تحلیل کن و پیشنهادات مشخص برای بهبود رتبه و افزایش CTR ارائه کن. در نظر بگیر که:
- محتوا به زبان فارسی است
- کاربران ایرانی مخاطب هستند
- الگوریتم گوگل برای فارسی ویژگی‌های خاصی دارد
- هدف بهبود از موقعیت {position:.1} به صفحه اول (۱-۱۰) است

**فرمت خروجی JSON (فقط این خروجی را برگردان):**
{{
  "url": "{url}",
  "main_keyword": "کلیدواژه اصلی پیشنهادی",
  "current_position": {position:.1},
  "improvement_priority": "بالا/متوسط/پایین",
  "analysis": {{
    "current_strength": "نقاط قوت فعلی محتوا",
    "main_weakness": "اصلی‌ترین ضعف محتوا"
  }},
  "primary_improvements": [
    "پیشنهاد بهبود ۱ - مشخص و عملی",
    "پیشنهاد بهبود ۲ - قابل اجرا",
    "پیشنهاد بهبود ۳ - با اولویت بالا"
  ],
  "content_enhancements": {{
    "add_sections": ["بخش پیشنهادی ۱", "بخش پیشنهادی ۲"],
    "recommended_h2_headings": ["هدینگ H2 پیشنهادی ۱", "هدینگ H2 پیشنهادی ۲"],
    "recommended_word_count": 2000,
    "add_elements": ["عناصر مورد نیاز: FAQ, جدول مقایسه، تصاویر"]
  }},
  "keyword_strategy": {{
    "primary_keywords": ["کلیدواژه اصلی ۱", "کلیدواژه اصلی ۲"],
    "lsi_keywords": ["LSI فارسی ۱", "LSI فارسی ۲", "LSI فارسی ۳"],
    "long_tail_keywords": ["عبارت طولانی ۱", "عبارت طولانی ۲"],
    "keyword_density_target": "1-2%"
  }},
  "technical_seo": {{
    "title_tag_suggestion": "عنوان پیشنهادی - حداکثر ۶۰ کاراکتر",
    "meta_description_suggestion": "توضیحات متا پیشنهادی - حداکثر ۱۶۰ کاراکتر",
    "url_optimization": "پیشنهاد بهینه‌سازی URL",
    "schema_markup": "نوع Schema پیشنهادی"
  }},
  "content_gaps": [
    "موضوع یا بخش از دست رفته ۱",
    "موضوع یا بخش از دست رفته ۲"
  ],
  "internal_linking": {{
    "suggested_anchor_texts": ["متن لینک داخلی ۱", "متن لینک داخلی ۲"],
    "target_pages": ["صفحات مرتبط برای لینک"]
  }},
  "user_experience": {{
    "improve_readability": "پیشنهاد بهبود خوانایی",
    "visual_elements": "عناصر بصری مورد نیاز",
    "cta_suggestion": "دکمه یا CTA پیشنهادی"
  }},
  "estimated_impact": {{
    "potential_position_improvement": "۵-۱۰ رتبه",
    "estimated_ctr_increase": "۲۰-۳۰٪",
    "implementation_difficulty": "آسان/متوسط/سخت",
    "persian_seo_focus": "تمرکز بر الگوریتم‌های گوگل برای محتوای فارسی"
  }}
}}

**نکات تحلیل:**
- تمرکز بر نیاز کاربران ایرانی و search intent فارسی
- بررسی رقبا در SERP فارسی
- توجه به Featured Snippet و People Also Ask
- پیشنهادات باید کاملاً عملی و قابل اجرا باشند
- طول محتوا را بر اساس استانداردهای محتوای فارسی تعیین کن"#
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Synonyms
// ─────────────────────────────────────────────────────────────────────────────

pub const SYNONYM_SYSTEM: &str =
    "You are a linguistic expert specializing in Persian language and SEO keyword variations.";

pub fn synonym_prompt(keyword: &str) -> String {
    format!(
        r#"
شما یک متخصص زبان‌شناسی و تحلیلگر معنایی هستید. وظیفه شما شناسایی تمام معادل‌های معنایی ممکن برای کلمه زیر است:

**کلمه اصلی:** {keyword}

برای این کلمه، تمام معادل‌های ممکن را در دسته‌بندی‌های زیر استخراج کنید:

## دسته‌بندی مترادف‌ها:

1. **مترادف‌های فارسی مستقیم**: کلمات فارسی با معنی دقیقاً مشابه یا نزدیک
   مثال برای "گوشی": تلفن، موبایل، تلفن همراه

2. **فینگلیش استاندارد**: نوشتار فارسی با حروف انگلیسی (تمام حالت‌های رایج)
   مثال برای "گوشی": gooshi, gushi, gooshi, gushy

3. **تایپ با کیبورد انگلیسی (QWERTY Layout)**: وقتی کاربر فارسی می‌نویسد ولی کیبوردش روی انگلیسی است
   مثال برای "گوشی": ',ad (گ=غ=', و=] یا و، ش=a، ی=d)

4. **اختصارات و اصطلاحات عامیانه**: فرم‌های کوتاه‌شده یا محاوره‌ای

5. **غلط‌های املایی رایج**: اشتباهات تایپی متداول
   مثال: گوشی -> گوشئ، گوش، گوشیی

6. **معادل انگلیسی**: ترجمه مستقیم به انگلیسی
   مثال برای "گوشی": mobile, phone, smartphone, cellphone

7. **مخفف‌ها**: حروف اختصاری رایج
   مثال: mobile -> mob, ph

8. **واژگان مرتبط**: کلماتی که در همان حوزه معنایی استفاده می‌شوند
   مثال برای "گوشی": تلفن هوشمند، اسمارت فون، موبایل فون

**خروجی:**
خروجی را به صورت JSON با ساختار زیر برگردان:

{{
  "persian_synonyms": ["مترادف1", "مترادف2", ...],
  "finglish_standard": ["gooshi", "gushi", ...],
  "english_keyboard_typing": ["',ad", "y,ad", ...],
  "colloquial_abbreviations": ["اختصار1", "اختصار2", ...],
  "common_misspellings": ["غلط1", "غلط2", ...],
  "english_equivalents": ["mobile", "phone", ...],
  "abbreviations": ["mob", "ph", ...],
  "related_terms": ["واژه مرتبط1", "واژه مرتبط2", ...]
}}

**نکات مهم:**
- حداقل 3-5 مورد برای هر دسته (اگر موجود باشد)
- تمام حالت‌های رایج را شامل شود
- دقت در کیبورد mapping فارسی-انگلیسی
- غلط‌های املایی واقعاً رایج را شامل شود

خروجی JSON را بنویس:
"#
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Article generation
// ─────────────────────────────────────────────────────────────────────────────

pub const WRITER_SYSTEM: &str = "You are an expert Persian SEO content writer.";
pub const HARMONY_SYSTEM: &str = "You are a content harmony expert.";

fn bullet_lines<'a>(items: impl Iterator<Item = &'a String>) -> String {
    items
        .map(|h| format!("  - {}", h))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn heading_prompt(
    project_name: &str,
    main_topic: &str,
    current_heading: &str,
    all_headings: &[String],
    word_count: u32,
    extra_instructions: &str,
) -> String {
    let related_headings = bullet_lines(all_headings.iter().filter(|h| *h != current_heading));
    let mut prompt = format!(
        r#"
**نقش شما:**
تو یک استراتژیست و متخصص تولید محتوای SEO هستی که برای وب‌سایت‌های ایرانی در فروشگاه‌های اینترنتی فعالیت می‌کنی. تخصص اصلی تو، ایجاد اقتدار موضوعی (Topical Authority) و تبدیل خواننده به خریدار از طریق محتوای هدفمند است.

**ورودی‌های پروژه:**
- **نام وب‌سایت:** {project_name}
- **موضوع اصلی مقاله:** {main_topic}
- **هدینگ فعلی:** {current_heading}
- **هدینگ‌های مرتبط در این مقاله:** {related_headings}

**دستورالعمل:**
محتوای تخصصی، کامل و کاربردی را **فقط برای هدینگ "{current_heading}"** بنویس.

**الزامات:**
- طول محتوا: حدود {word_count} کلمه
- لحن: حرفه‌ای، مثبت و جذاب
- بهینه‌سازی SEO: استفاده طبیعی از کلمات کلیدی
- ساختار: شامل زیرعناوین H3 در صورت نیاز، پاراگراف‌ها، لیست‌ها
- E-E-A-T: تخصص، تجربه، اعتبار و اعتمادپذیری
- تنوع در جملات: ترکیب جملات کوتاه و بلند
- طبیعی بودن: عبارات محاوره‌ای ملایم، مثال‌های عملی
- **مهم:** بدون نتیجه‌گیری یا جمع‌بندی برای این بخش - فقط محتوای اصلی

**خروجی:**
فقط متن محتوا را برای این هدینگ بنویس (بدون ذکر خود هدینگ و بدون نتیجه‌گیری). محتوا باید با تگ‌های HTML فرمت‌بندی شود:
- برای زیرعناوین از <h3> استفاده کن
- برای تاکید از <strong> استفاده کن
- برای لیست‌ها از <ul> و <li> استفاده کن

همچنین، در متن نهایی، به صورت تصادفی (حدود ۲۰-۳۰% موارد) برخی نیم‌فاصله‌ها را حذف کن و با فاصله معمولی جایگزین کن.

محتوا را بنویس:
"#
    );
    if !extra_instructions.trim().is_empty() {
        prompt.push_str(&format!(
            "\n\n**دستورالعمل اضافی:**\n{}\n\n",
            extra_instructions.trim()
        ));
    }
    prompt
}

/// "This article has N sections: a، b، c و K بخش دیگر".
pub fn content_summary(headings: &[String]) -> String {
    let first: Vec<&str> = headings.iter().take(3).map(String::as_str).collect();
    let mut summary = format!("این مقاله شامل {} بخش است: {}", headings.len(), first.join("، "));
    if headings.len() > 3 {
        summary.push_str(&format!(" و {} بخش دیگر", headings.len() - 3));
    }
    summary
}

pub fn intro_prompt(project_name: &str, main_topic: &str, headings: &[String], summary: &str) -> String {
    let all_headings = bullet_lines(headings.iter());
    format!(
        r#"
**نقش شما:**
متخصص تولید محتوای SEO برای وب‌سایت‌های ایرانی.

**ورودی‌ها:**
- **نام وب‌سایت:** {project_name}
- **موضوع مقاله:** {main_topic}
- **هدینگ‌های مقاله:** {all_headings}
- **خلاصه محتوای تولید شده:** {summary}

**دستورالعمل:**
یک مقدمه جذاب و حرفه‌ای برای این مقاله بنویس.

**الزامات:**
- طول: 150-200 کلمه
- جذب خواننده از همان ابتدا
- معرفی موضوع و اهمیت آن
- اشاره به آنچه در مقاله خواهد آمد
- بهینه‌سازی SEO با کلمات کلیدی اصلی

**خروجی:**
فقط متن مقدمه با فرمت HTML (بدون تگ <h2>، فقط <p> و <strong>).
"#
    )
}

pub fn conclusion_prompt(
    project_name: &str,
    main_topic: &str,
    headings: &[String],
    summary: &str,
) -> String {
    let all_headings = bullet_lines(headings.iter());
    format!(
        r#"
**نقش شما:**
متخصص تولید محتوای SEO برای وب‌سایت‌های ایرانی.

**ورودی‌ها:**
- **نام وب‌سایت:** {project_name}
- **موضوع مقاله:** {main_topic}
- **هدینگ‌های مقاله:** {all_headings}
- **خلاصه محتوای تولید شده:** {summary}

**دستورالعمل:**
یک نتیجه‌گیری قوی و کاربردی برای این مقاله بنویس.

**الزامات:**
- طول: 100-150 کلمه
- جمع‌بندی نکات کلیدی
- ارائه توصیه‌های نهایی
- دعوت به اقدام (CTA) در صورت مناسب بودن
- خاتمه قوی و به یادماندنی

**خروجی:**
فقط متن نتیجه‌گیری با فرمت HTML (بدون تگ <h2>، فقط <p> و <strong>).
"#
    )
}

pub fn harmony_prompt(main_topic: &str, content_preview: &str) -> String {
    format!(
        r#"
**نقش شما:**
متخصص ویرایش و بررسی هماهنگی محتوا.

**موضوع مقاله:** {main_topic}

**محتوای تولید شده:**
{content_preview}

**دستورالعمل:**
این محتوا را از نظر هماهنگی بررسی کن. آیا:
1. لحن نوشتاری در همه بخش‌ها یکسان است؟
2. سبک نگارش ثابت است؟
3. ارتباط منطقی بین بخش‌ها وجود دارد؟
4. تکرار غیرضروری اطلاعات نیست؟

**خروجی:**
فقط "OK" بنویس اگر محتوا هماهنگ است.
اگر مشکلی وجود دارد، شماره بخش و توضیح کوتاه بده (مثال: "بخش 2: لحن خیلی رسمی‌تر از بقیه است").
"#
    )
}
